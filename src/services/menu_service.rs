use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::menu::{MenuItem, Restaurant};
use crate::domain::{Actor, Role};
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::ports::{MenuItemRepository, RestaurantRepository};

use super::observe;

/// Restaurants and their menus: owners manage them, anyone may browse.
#[derive(Clone)]
pub struct MenuService {
    menu_items: Arc<dyn MenuItemRepository>,
    restaurants: Arc<dyn RestaurantRepository>,
    metrics: Option<Arc<Metrics>>,
}

impl MenuService {
    pub fn new(
        menu_items: Arc<dyn MenuItemRepository>,
        restaurants: Arc<dyn RestaurantRepository>,
    ) -> Self {
        Self {
            menu_items,
            restaurants,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a restaurant owned by the calling owner.
    pub async fn create_restaurant(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        restaurant: Restaurant,
    ) -> AppResult<i64> {
        let started = Instant::now();
        let result = self.create_restaurant_inner(cancel, actor, restaurant).await;
        observe(self.metrics.as_ref(), "create_restaurant", started, &result);
        result
    }

    async fn create_restaurant_inner(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        restaurant: Restaurant,
    ) -> AppResult<i64> {
        if !restaurant.validate() {
            return Err(AppError::invalid("invalid restaurant data"));
        }
        let actor = actor.require_role(Role::Owner, "only owners can create restaurants")?;
        if restaurant.owner_id != actor.user_id {
            return Err(AppError::forbidden("restaurants can only be created for yourself"));
        }

        let id = self.restaurants.save(cancel, &restaurant).await?;
        tracing::info!(restaurant_id = id, owner_id = actor.user_id, "🏪 Restaurant created");
        Ok(id)
    }

    /// All restaurants, for customers browsing before they order. Public read.
    pub async fn list_restaurants(&self, cancel: &CancellationToken) -> AppResult<Vec<Restaurant>> {
        let started = Instant::now();
        let result = self.restaurants.find_all(cancel).await;
        observe(self.metrics.as_ref(), "list_restaurants", started, &result);
        result
    }

    pub async fn create_menu_item(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        item: MenuItem,
    ) -> AppResult<i64> {
        let started = Instant::now();
        let result = self.create_menu_item_inner(cancel, actor, item).await;
        observe(self.metrics.as_ref(), "create_menu_item", started, &result);
        result
    }

    async fn create_menu_item_inner(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        item: MenuItem,
    ) -> AppResult<i64> {
        if !item.validate() {
            return Err(AppError::invalid("invalid menu item data"));
        }
        let actor = actor.require_role(Role::Owner, "only owners can manage menu items")?;
        self.require_owned_restaurant(cancel, actor, item.restaurant_id).await?;

        let id = self.menu_items.save(cancel, &item).await?;
        tracing::info!(
            menu_item_id = id,
            restaurant_id = item.restaurant_id,
            price = %item.price,
            "Menu item created"
        );
        Ok(id)
    }

    /// Every menu item of a restaurant, available or not. Public read.
    pub async fn list_menu_items(
        &self,
        cancel: &CancellationToken,
        restaurant_id: i64,
    ) -> AppResult<Vec<MenuItem>> {
        let started = Instant::now();
        let result = if restaurant_id <= 0 {
            Err(AppError::invalid("invalid restaurant id"))
        } else {
            self.menu_items.find_by_restaurant_id(cancel, restaurant_id).await
        };
        observe(self.metrics.as_ref(), "list_menu_items", started, &result);
        result
    }

    pub async fn update_availability(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        menu_item_id: i64,
        available: bool,
    ) -> AppResult<()> {
        let started = Instant::now();
        let result = self
            .update_availability_inner(cancel, actor, menu_item_id, available)
            .await;
        observe(self.metrics.as_ref(), "update_availability", started, &result);
        result
    }

    async fn update_availability_inner(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        menu_item_id: i64,
        available: bool,
    ) -> AppResult<()> {
        if menu_item_id <= 0 {
            return Err(AppError::invalid("invalid menu item id"));
        }
        let actor = actor.require_role(Role::Owner, "only owners can manage menu items")?;

        let item = self.menu_items.find_by_id(cancel, menu_item_id).await?;
        self.require_owned_restaurant(cancel, actor, item.restaurant_id).await?;

        self.menu_items
            .update_availability(cancel, menu_item_id, available)
            .await?;
        tracing::info!(menu_item_id, available, "Menu item availability changed");
        Ok(())
    }

    async fn require_owned_restaurant(
        &self,
        cancel: &CancellationToken,
        actor: &Actor,
        restaurant_id: i64,
    ) -> AppResult<Restaurant> {
        let restaurant = self.restaurants.find_by_id(cancel, restaurant_id).await?;
        if !actor.is(restaurant.owner_id) {
            return Err(AppError::forbidden("restaurant belongs to another owner"));
        }
        Ok(restaurant)
    }
}
