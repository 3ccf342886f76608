//! Integration tests for provider codecs

use price_bridge::bridge::{
    ProviderResult, SubscriptionKey, WireCodec, INVALID_PAIR_MESSAGE, INVALID_PAIR_STATUS,
};
use price_bridge::providers::{CryptoCompareCodec, NcfxCodec, ProviderKind};
use serde_json::json;

fn pairs() -> Vec<SubscriptionKey> {
    ["ETH/USD", "BTC/EUR", "LINK/ETH", "DOGE/USDT"]
        .iter()
        .map(|pair| pair.parse().unwrap())
        .collect()
}

#[test]
fn test_cryptocompare_price_example() {
    let results = CryptoCompareCodec
        .decode(r#"{"TYPE":"5","PRICE":1595.50,"FROMSYMBOL":"ETH","TOSYMBOL":"USD"}"#);

    assert_eq!(results.len(), 1);
    let ProviderResult::Price(price) = &results[0] else {
        panic!("expected price, got {:?}", results[0]);
    };
    assert_eq!(price.key.base(), "ETH");
    assert_eq!(price.key.quote(), "USD");
    assert_eq!(price.value, 1595.50);
}

#[test]
fn test_cryptocompare_invalid_sub_example() {
    let results = CryptoCompareCodec.decode(
        r#"{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~ETH~XYZ","INFO":"We have not integrated any of the exchanges in the pair"}"#,
    );

    assert_eq!(results.len(), 1);
    let ProviderResult::Error(error) = &results[0] else {
        panic!("expected error, got {:?}", results[0]);
    };
    assert_eq!(error.key, SubscriptionKey::new("ETH", "XYZ"));
    assert_eq!(error.status_code, INVALID_PAIR_STATUS);
    assert_eq!(error.message, INVALID_PAIR_MESSAGE);
}

#[test]
fn test_cryptocompare_subscribe_then_push_matches_key() {
    for key in pairs() {
        let frame = CryptoCompareCodec.encode_subscribe(&key);
        let sub = frame["subs"][0].as_str().unwrap();
        assert_eq!(sub, format!("5~CCCAGG~{}~{}", key.base(), key.quote()));

        let push = json!({
            "TYPE": "5",
            "PRICE": 42.5,
            "FROMSYMBOL": key.base(),
            "TOSYMBOL": key.quote(),
        });
        let results = CryptoCompareCodec.decode(&push.to_string());
        assert_eq!(results.len(), 1, "{key}");
        assert_eq!(results[0].key(), &key);
    }
}

#[test]
fn test_ncfx_subscribe_then_push_matches_key() {
    for key in pairs() {
        let frame = NcfxCodec.encode_subscribe(&key);
        assert_eq!(frame["ccy"], key.to_string());

        let push = json!({
            "timestamp": "2023-01-31T20:10:41",
            "currencyPair": key.to_string(),
            "bid": 1.0,
            "offer": 2.0,
            "mid": 1.5,
        });
        let results = NcfxCodec.decode(&push.to_string());
        assert_eq!(results.len(), 1, "{key}");
        assert_eq!(results[0].key(), &key);
    }
}

#[test]
fn test_info_messages_yield_nothing() {
    let cryptocompare = [
        r#"{"TYPE":"20","MESSAGE":"STREAMERWELCOME"}"#,
        r#"{"TYPE":"16","MESSAGE":"SUBSCRIBECOMPLETE","SUB":"5~CCCAGG~ETH~USD"}"#,
        r#"{"TYPE":"3","MESSAGE":"LOADCOMPLETE"}"#,
        r#"{"TYPE":"999","MESSAGE":"HEARTBEAT"}"#,
    ];
    for frame in cryptocompare {
        assert!(CryptoCompareCodec.decode(frame).is_empty(), "{frame}");
    }

    let ncfx = [
        r#"{"Type":"Info","Message":"Succesfully Authenticated"}"#,
        r#"{"Type":"Info","Message":"Subscribed to ETH/USD"}"#,
        r#"{"Type":"Error","Message":"anything at all","currencyPair":"ETH/USD","bid":1,"offer":1,"mid":1}"#,
    ];
    for frame in ncfx {
        assert!(NcfxCodec.decode(frame).is_empty(), "{frame}");
    }
}

#[test]
fn test_missing_required_field_yields_nothing() {
    let full = json!({
        "timestamp": "2023-01-31T20:10:41",
        "currencyPair": "ETH/USD",
        "bid": 1595.4999,
        "offer": 1595.5694,
        "mid": 1595.5346,
    });

    for field in ["currencyPair", "bid", "offer", "mid"] {
        let mut frame = full.clone();
        frame.as_object_mut().unwrap().remove(field);
        assert!(NcfxCodec.decode(&frame.to_string()).is_empty(), "missing {field}");
    }

    for field in ["FROMSYMBOL", "TOSYMBOL", "PRICE"] {
        let mut frame = json!({"TYPE": "5", "PRICE": 1.0, "FROMSYMBOL": "ETH", "TOSYMBOL": "USD"});
        frame.as_object_mut().unwrap().remove(field);
        assert!(
            CryptoCompareCodec.decode(&frame.to_string()).is_empty(),
            "missing {field}"
        );
    }
}

#[test]
fn test_results_serialize_as_tagged_json() {
    let results = ProviderKind::CryptoCompare
        .codec()
        .decode(r#"{"TYPE":"5","PRICE":2.0,"FROMSYMBOL":"BTC","TOSYMBOL":"USD"}"#);
    let value = serde_json::to_value(&results[0]).unwrap();
    assert_eq!(value["kind"], "price");
    assert_eq!(value["value"], 2.0);
}
