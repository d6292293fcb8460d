use std::time::Duration;

use manapool_http::{CancellationToken, ClientOptions, InventoryOptions, ManapoolClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let token = std::env::var("MANAPOOL_TOKEN")?;
    let email = std::env::var("MANAPOOL_EMAIL")?;

    let client = ManapoolClient::new(token, email).with_options(
        ClientOptions::default()
            .rate_limit(5.0, 2)
            .retry(3, Duration::from_millis(500))
            .max_backoff(Duration::from_secs(5)),
    )?;

    let cancel = CancellationToken::new();
    cancel.cancel_after(Duration::from_secs(60));

    let account = client.seller_account(&cancel).await?;
    println!("{} <{}> verified={}", account.username, account.email, account.verified);

    let page = client
        .seller_inventory(InventoryOptions::new(50, 0), &cancel)
        .await?;
    for item in page.inventory {
        let name = item
            .product
            .single
            .as_ref()
            .map(|single| format!("{} [{}]", single.name, single.condition_name()))
            .or_else(|| item.product.sealed.as_ref().map(|sealed| sealed.name.clone()))
            .unwrap_or_else(|| item.product_id.clone());
        println!("{name}: {} x ${:.2}", item.quantity, item.price_dollars());
    }
    println!(
        "showing {} of {} listings",
        page.pagination.returned, page.pagination.total
    );

    Ok(())
}
