use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::domain::menu::MenuSnapshot;
use crate::error::{AppError, AppResult};
use crate::ports::MenuItemRepository;

/// Builds the current price/availability snapshot of a restaurant's menu.
///
/// Reads straight through to the repository on every call; a snapshot is
/// only as fresh as the request that asked for it.
#[derive(Clone)]
pub struct MenuAvailabilityResolver {
    menu_items: Arc<dyn MenuItemRepository>,
}

impl MenuAvailabilityResolver {
    pub fn new(menu_items: Arc<dyn MenuItemRepository>) -> Self {
        Self { menu_items }
    }

    /// Fails `Invalid` when the restaurant has no menu items at all: nothing
    /// can be validated against an empty menu.
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        restaurant_id: i64,
    ) -> AppResult<MenuSnapshot> {
        let items = self
            .menu_items
            .find_by_restaurant_id(cancel, restaurant_id)
            .await?;

        if items.is_empty() {
            return Err(AppError::invalid("restaurant has no menu items"));
        }

        tracing::debug!(
            restaurant_id = restaurant_id,
            item_count = items.len(),
            "Resolved menu snapshot"
        );

        Ok(MenuSnapshot::new(restaurant_id, items))
    }
}
