//! Integration tests for the bridge over an in-memory transport

use price_bridge::bridge::{
    Bridge, BridgeConfig, ConnectionState, ProviderResult, SubscriptionKey,
};
use price_bridge::config::{Config, Secret};
use price_bridge::providers::{self, ProviderKind};
use price_bridge::ws::MemoryTransport;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

fn ncfx_config() -> Config {
    let mut config = Config::default();
    config.provider.kind = ProviderKind::Ncfx;
    config.ncfx.api_username = "user".to_string();
    config.ncfx.api_password = Secret::new("pass");
    config
}

#[tokio::test]
async fn test_cryptocompare_stream() {
    let transport = MemoryTransport::new();
    let mut peer = transport.push_connection();
    peer.push_text(r#"{"TYPE":"20","MESSAGE":"STREAMERWELCOME"}"#)
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let mut bridge = Bridge::new(
        providers::policy(&Config::default()),
        BridgeConfig::default(),
        tx,
    );
    assert_ok!(bridge.open(&transport).await);
    assert_eq!(bridge.state(), ConnectionState::Ready);

    let key = SubscriptionKey::new("ETH", "USD");
    assert_ok!(bridge.subscribe(&key));
    assert_eq!(
        peer.next_sent().await.as_deref(),
        Some(r#"{"action":"SubAdd","subs":["5~CCCAGG~ETH~USD"]}"#)
    );

    peer.push_text(r#"{"TYPE":"16","MESSAGE":"SUBSCRIBECOMPLETE"}"#)
        .await
        .unwrap();
    peer.push_text(r#"{"TYPE":"5","PRICE":1595.50,"FROMSYMBOL":"ETH","TOSYMBOL":"USD"}"#)
        .await
        .unwrap();
    assert_eq!(assert_ok!(bridge.process_next().await), 0);
    assert_eq!(assert_ok!(bridge.process_next().await), 1);

    let ProviderResult::Price(price) = rx.recv().await.unwrap() else {
        panic!("expected price");
    };
    assert_eq!(price.key, key);
    assert_eq!(price.value, 1595.50);
}

#[tokio::test]
async fn test_ncfx_login_precedes_subscribe() {
    let transport = MemoryTransport::new();
    let mut peer = transport.push_connection();
    peer.push_text(r#"{"Type":"Info","Message":"Succesfully Authenticated"}"#)
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let mut bridge = Bridge::new(providers::policy(&ncfx_config()), BridgeConfig::default(), tx);
    assert_ok!(bridge.open(&transport).await);

    let login: serde_json::Value = serde_json::from_str(&peer.next_sent().await.unwrap()).unwrap();
    assert_eq!(login["request"], "login");
    assert_eq!(login["username"], "user");

    assert_ok!(bridge.subscribe(&SubscriptionKey::new("ETH", "USD")));
    let sub: serde_json::Value = serde_json::from_str(&peer.next_sent().await.unwrap()).unwrap();
    assert_eq!(sub["request"], "subscribe");
    assert_eq!(sub["ccy"], "ETH/USD");

    peer.push_text(r#"{"timestamp":"2023-01-31T20:10:41","currencyPair":"ETH/USD","bid":1595.4999,"offer":1595.5694,"mid":1595.5346}"#)
        .await
        .unwrap();
    assert_eq!(assert_ok!(bridge.process_next().await), 1);
    assert!(!rx.recv().await.unwrap().is_error());
}

#[tokio::test]
async fn test_ncfx_rejected_login_fails() {
    let transport = MemoryTransport::new();
    let peer = transport.push_connection();
    peer.push_text(r#"{"Type":"Error","Message":"Invalid credentials"}"#)
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let mut bridge = Bridge::new(providers::policy(&ncfx_config()), BridgeConfig::default(), tx);
    assert!(bridge.open(&transport).await.is_err());
    assert_eq!(bridge.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_unsubscribe_unknown_and_close_twice() {
    let transport = MemoryTransport::new();
    let mut peer = transport.push_connection();
    peer.push_text(r#"{"TYPE":"20","MESSAGE":"STREAMERWELCOME"}"#)
        .await
        .unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let mut bridge = Bridge::new(
        providers::policy(&Config::default()),
        BridgeConfig {
            handshake_timeout: Duration::from_secs(1),
        },
        tx,
    );
    assert_ok!(bridge.open(&transport).await);

    assert_ok!(bridge.unsubscribe(&SubscriptionKey::new("BTC", "USD")));
    assert!(peer.try_next_sent().is_none());

    bridge.close();
    bridge.close();
    assert_eq!(bridge.state(), ConnectionState::Closed);
    assert!(peer.next_sent().await.is_none());
}
