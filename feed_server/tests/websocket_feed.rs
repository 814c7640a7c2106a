use feed_common::PriceUpdate;
use feed_common::net::PRICES_PATH;
use feed_server::config::default_seeds;
use feed_server::{
    BroadcastHub, PriceMutator, PriceRegistry, PushEndpoint, TickLoop, TickLoopHandle,
};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

type Client = WebSocket<MaybeTlsStream<TcpStream>>;

struct Feed {
    addr: SocketAddr,
    hub: Arc<BroadcastHub>,
    tick_loop: TickLoopHandle,
}

fn start_feed(interval: Duration) -> Feed {
    let registry = Arc::new(PriceRegistry::initialize(&default_seeds()).unwrap());
    let hub = Arc::new(BroadcastHub::default());
    let endpoint = PushEndpoint::new(TcpListener::bind("127.0.0.1:0").unwrap(), Arc::clone(&hub));
    let addr = endpoint.local_addr().unwrap();
    thread::spawn(move || endpoint.accept_loop());

    let mutator = PriceMutator::seeded(0.005, 99).unwrap();
    let tick_loop = TickLoop::new(registry, mutator, Arc::clone(&hub)).spawn(interval).unwrap();
    Feed { addr, hub, tick_loop }
}

fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tungstenite::connect(format!("ws://{}{}", addr, PRICES_PATH)).unwrap();
    client
}

fn next_update(client: &mut Client) -> PriceUpdate {
    loop {
        if let Message::Text(text) = client.read().unwrap() {
            return PriceUpdate::from_json(&text).unwrap();
        }
    }
}

fn wait_for_subscribers(hub: &BroadcastHub, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while hub.subscriber_count().unwrap() != expected {
        assert!(Instant::now() < deadline, "subscriber count never reached {}", expected);
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_client_receives_ordered_snapshots() {
    let feed = start_feed(Duration::from_millis(50));
    let mut client = connect(feed.addr);

    let updates: Vec<PriceUpdate> = (0..5).map(|_| next_update(&mut client)).collect();
    feed.tick_loop.stop().unwrap();

    for update in &updates {
        assert!(update.is_price_update());
        let symbols: Vec<&str> = update.data.iter().map(|v| v.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "GOOG", "MSFT", "AMZN", "TSLA"]);
        for view in &update.data {
            assert_eq!(view.currency, "USD");
            assert!(view.price > rust_decimal::Decimal::ZERO);
        }
    }
    assert!(updates.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert!(updates.windows(2).all(|w| w[0].data[4].sequence_id < w[1].data[4].sequence_id));
}

#[test]
fn test_disconnect_does_not_disturb_other_clients() {
    let feed = start_feed(Duration::from_millis(50));
    let mut staying = connect(feed.addr);
    let leaving = connect(feed.addr);
    wait_for_subscribers(&feed.hub, 2);

    next_update(&mut staying);
    drop(leaving);
    wait_for_subscribers(&feed.hub, 1);

    let first = next_update(&mut staying);
    let second = next_update(&mut staying);
    assert!(first.timestamp < second.timestamp);

    feed.tick_loop.stop().unwrap();
}
