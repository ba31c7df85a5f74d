//! Binary entry point: a small scripted demonstration of the marketplace.
//!
//! Runs one full trade end to end against an in-memory marketplace and
//! prints the resulting accounts and ledger movements.

use std::collections::BTreeMap;

use trade_kernel::engine::Marketplace;
use trade_kernel::signature::{HashSigner, SignatureService};
use trade_kernel::types::{Bid, BidType, Money};
use trade_kernel::MarketConfig;

fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let market = Marketplace::new(MarketConfig::default());
    let signer = HashSigner;
    let mut now = 0u64;

    println!("placing an ask of mBTC 8 and a bid of mBTC 10 on 'render'...");
    let ask = Bid::new(
        BidType::Sell,
        "render".into(),
        Money::parse("mBTC 8").unwrap(),
        "seller",
        "ask doc",
        signer.sign("ask doc", "seller"),
        now,
        market.config(),
    )
    .unwrap();
    market.enqueue_bid(ask, now).unwrap();

    now += 500;
    let bid = Bid::new(
        BidType::Buy,
        "render".into(),
        Money::parse("mBTC 10").unwrap(),
        "buyer",
        "bid doc",
        signer.sign("bid doc", "buyer"),
        now,
        market.config(),
    )
    .unwrap();
    let bid_key = market.enqueue_bid(bid, now).unwrap();

    let tx_key = market
        .get_bid(bid_key)
        .unwrap()
        .transaction
        .expect("bids should have matched");
    let tx = market.get_transaction(tx_key).unwrap();
    println!("matched: price {} fee {}", tx.price, tx.fee);

    // walk the happy path of the protocol
    let work_hash = [1u8; 32];
    let secret = [2u8; 32];
    let secret_hash = {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(work_hash);
        hasher.update(secret);
        hex::encode(hasher.finalize())
    };

    let steps: Vec<(&str, BTreeMap<String, String>)> = vec![
        ("buyer", args(&[
            ("workhash", &hex::encode(work_hash)),
            ("worksecrethash", &secret_hash),
        ])),
        ("seller", args(&[("workerurl", "http://worker:8082/")])),
        ("seller", args(&[("buyersecret", &hex::encode(secret))])),
        ("buyer", args(&[("acceptresult", "")])),
    ];
    for (address, arguments) in steps {
        now += 1_000;
        let message = market
            .send_message(tx_key, address, "msg", "sig", &arguments, now)
            .unwrap();
        println!(
            "{}: {} -> {} ({})",
            address,
            message.pre_phase.as_str(),
            message.post_phase.as_str(),
            if message.accepted { "accepted" } else { message.reject_message.as_str() },
        );
    }

    now += 1_000;
    market.run_due_triggers(now);

    let tx = market.get_transaction(tx_key).unwrap();
    println!("transaction settled in phase {}", tx.phase.as_str());
    for name in ["buyer", "seller"] {
        let account = market.account(name);
        println!(
            "{}: available {} / blocked {}",
            name, account.available, account.blocked
        );
        for movement in market.account_movements(name, 10) {
            println!("  {}", movement);
        }
    }
}
