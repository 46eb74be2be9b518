//! Checkout command.

use std::sync::Arc;
use std::time::Duration;

use souq_storefront::{CheckoutForm, Frontend, OrderCoordinator, Route, SubmitOutcome};

use super::{App, CliError, orders, print_line};

/// Extra time allowed for the scheduled navigation to arrive.
const NAVIGATION_GRACE: Duration = Duration::from_millis(250);

/// Submit the cart as an order, then follow the coordinator's navigation.
///
/// # Errors
///
/// Returns `CliError::Checkout` if the submission did not succeed. The
/// reason has already been printed as a notification.
pub async fn submit(app: &App, mut form: CheckoutForm) -> Result<(), CliError> {
    let frontend: Arc<dyn Frontend> = app.frontend.clone();
    let coordinator = OrderCoordinator::new(
        app.api.clone(),
        app.cart.clone(),
        frontend,
        app.config.navigation_delay,
    );

    match coordinator.submit(&mut form).await {
        SubmitOutcome::Succeeded(confirmation) => {
            tracing::info!(destination = %confirmation.destination, "Waiting for navigation");
            tokio::time::sleep(app.config.navigation_delay + NAVIGATION_GRACE).await;
            follow(app, app.frontend.try_next_route()).await
        }
        SubmitOutcome::Busy => Err(CliError::Checkout(
            "another submission is in progress".to_string(),
        )),
        SubmitOutcome::Failed(e) => {
            if let Some(route) = app.frontend.try_next_route() {
                follow(app, Some(route)).await?;
            }
            Err(CliError::Checkout(e.to_string()))
        }
    }
}

async fn follow(app: &App, route: Option<Route>) -> Result<(), CliError> {
    match route {
        Some(Route::OrderDetail(id)) => orders::show(app, id.as_i64()).await,
        Some(Route::OrderList) => orders::list(app, None).await,
        Some(Route::Login) => {
            print_line("Your session has expired. Sign in again with `souq login --token <TOKEN>`.");
            Ok(())
        }
        None => Ok(()),
    }
}
