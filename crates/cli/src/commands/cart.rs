//! Cart commands.
//!
//! Every mutation re-fetches the cart, so the printed cart is always the
//! server's view after the change.

use souq_core::{Price, ProductId};
use souq_storefront::CartSnapshot;

use super::{App, CliError, print_line};

/// Fetch and print the cart.
///
/// # Errors
///
/// Returns `CliError` if the cart cannot be fetched.
pub async fn show(app: &App) -> Result<(), CliError> {
    let snapshot = app.cart.refresh().await?;
    render(app, &snapshot)
}

/// Add a product.
///
/// # Errors
///
/// Returns `CliError` if the backend refuses.
pub async fn add(app: &App, product_id: i64, quantity: u32) -> Result<(), CliError> {
    app.cart.add_line(ProductId::new(product_id), quantity).await?;
    print_line(format!("Added {quantity} x product {product_id}."));
    render_current(app)
}

/// Change a product's quantity.
///
/// # Errors
///
/// Returns `CliError` if the backend refuses.
pub async fn update(app: &App, product_id: i64, quantity: u32) -> Result<(), CliError> {
    app.cart
        .update_line(ProductId::new(product_id), quantity)
        .await?;
    print_line(format!("Product {product_id} quantity set to {quantity}."));
    render_current(app)
}

/// Remove a product.
///
/// # Errors
///
/// Returns `CliError` if the backend refuses.
pub async fn remove(app: &App, product_id: i64) -> Result<(), CliError> {
    app.cart.remove_line(ProductId::new(product_id)).await?;
    print_line(format!("Removed product {product_id}."));
    render_current(app)
}

/// Empty the cart on the server.
///
/// # Errors
///
/// Returns `CliError` if the backend refuses.
pub async fn clear(app: &App) -> Result<(), CliError> {
    app.cart.clear_remote().await?;
    print_line("Cart cleared.");
    Ok(())
}

/// Apply a coupon.
///
/// # Errors
///
/// Returns `CliError` if the coupon is rejected.
pub async fn apply_coupon(app: &App, code: &str) -> Result<(), CliError> {
    app.cart.apply_coupon(code).await?;
    print_line(format!("Coupon {} applied.", code.trim()));
    render_current(app)
}

/// Remove the applied coupon.
///
/// # Errors
///
/// Returns `CliError` if the backend refuses.
pub async fn remove_coupon(app: &App) -> Result<(), CliError> {
    app.cart.remove_coupon().await?;
    print_line("Coupon removed.");
    render_current(app)
}

fn render_current(app: &App) -> Result<(), CliError> {
    match app.cart.snapshot() {
        Some(snapshot) => render(app, &snapshot),
        None => {
            print_line("(cart could not be refreshed; run `souq cart show` to retry)");
            Ok(())
        }
    }
}

fn render(app: &App, snapshot: &CartSnapshot) -> Result<(), CliError> {
    if app.json {
        return app.print_json(snapshot);
    }

    if snapshot.is_empty() {
        print_line("Your cart is empty.");
        return Ok(());
    }

    let money = |amount| Price::new(amount, snapshot.currency.clone());
    for line in &snapshot.lines {
        let unit = line
            .unit_price
            .map_or_else(|| "-".to_string(), |p| money(p).to_string());
        let total = line
            .line_total
            .map_or_else(|| "-".to_string(), |p| money(p).to_string());
        print_line(format!(
            "#{:<6} {:<32} {:>3} x {:>14} = {:>14}",
            line.product_id, line.name, line.quantity, unit, total
        ));
    }

    let totals = &snapshot.totals;
    print_line(format!("Items:    {}", snapshot.item_count));
    print_line(format!("Subtotal: {}", money(totals.subtotal)));
    print_line(format!("Shipping: {}", money(totals.shipping)));
    print_line(format!("Tax:      {}", money(totals.tax)));
    if let Some(coupon) = &snapshot.coupon {
        print_line(format!("Coupon:   {}", coupon.code));
    }
    print_line(format!("Discount: -{}", money(totals.discount)));
    print_line(format!("Total:    {}", money(totals.total)));
    Ok(())
}
