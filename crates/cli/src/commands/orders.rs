//! Order follow-up commands.

use souq_core::OrderId;

use super::{App, CliError, print_line};

/// List orders.
///
/// # Errors
///
/// Returns `CliError` if the orders cannot be fetched.
pub async fn list(app: &App, page: Option<u32>) -> Result<(), CliError> {
    let orders = app.orders.list(page).await?;
    if app.json {
        return app.print_json(&orders);
    }
    if orders.is_empty() {
        print_line("No orders yet.");
    }
    for order in &orders {
        print_line(format!(
            "#{:<6} {:<14} {:<12} {:>14} {}",
            order.id,
            order.order_number.as_deref().unwrap_or("-"),
            order.status.to_string(),
            order
                .total
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            order
                .placed_at
                .map_or_else(String::new, |at| at.format("%Y-%m-%d %H:%M").to_string()),
        ));
    }
    Ok(())
}

/// Show one order.
///
/// # Errors
///
/// Returns `CliError` if the order cannot be fetched.
pub async fn show(app: &App, id: i64) -> Result<(), CliError> {
    let order = app.orders.get(OrderId::new(id)).await?;
    if app.json {
        return app.print_json(&order);
    }

    let summary = &order.summary;
    print_line(format!(
        "Order {} ({})",
        summary.order_number.as_deref().unwrap_or("-"),
        summary.id
    ));
    print_line(format!("Status: {}", summary.status));
    for line in &order.lines {
        print_line(format!(
            "  {} x {} {}",
            line.quantity,
            line.name,
            line.price
                .as_ref()
                .map_or_else(String::new, |p| format!("@ {p}"))
        ));
    }
    if let Some(total) = &summary.total {
        print_line(format!("Total: {total}"));
    }
    if let Some(address) = &order.shipping_address {
        print_line(format!(
            "Ship to: {}, {}, {}, {}",
            address.recipient_name, address.street, address.city, address.governorate
        ));
    }
    Ok(())
}

/// Show tracking for one order.
///
/// # Errors
///
/// Returns `CliError` if tracking cannot be fetched.
pub async fn track(app: &App, id: i64) -> Result<(), CliError> {
    let tracking = app.orders.tracking(OrderId::new(id)).await?;
    if app.json {
        return app.print_json(&tracking);
    }

    print_line(format!("Status: {}", tracking.status));
    if let Some(number) = &tracking.tracking_number {
        print_line(format!(
            "Tracking: {number}{}",
            tracking
                .carrier
                .as_deref()
                .map_or_else(String::new, |c| format!(" via {c}"))
        ));
    }
    for event in &tracking.events {
        print_line(format!(
            "  {} {} {}",
            event
                .at
                .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string()),
            event.status,
            event.description.as_deref().unwrap_or("")
        ));
    }
    Ok(())
}

/// Cancel an order.
///
/// # Errors
///
/// Returns `CliError` if the backend refuses.
pub async fn cancel(app: &App, id: i64, reason: Option<&str>) -> Result<(), CliError> {
    app.orders.cancel(OrderId::new(id), reason).await?;
    print_line(format!("Order {id} cancelled."));
    Ok(())
}
