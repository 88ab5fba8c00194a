//! Cache key conventions for the marketplace domains
//!
//! Keys are colon-separated and grouped so that one [`CachePatterns`] glob
//! invalidates everything derived from an entity.

use std::fmt::Display;
use std::time::Duration;

/// Key builders
pub struct CacheKeys;

impl CacheKeys {
    // Cart

    pub fn cart_items(user_id: impl Display) -> String {
        format!("cart:{}:items", user_id)
    }

    pub fn cart_summary(user_id: impl Display) -> String {
        format!("cart:{}:summary", user_id)
    }

    pub fn cart_count(user_id: impl Display) -> String {
        format!("cart:{}:count", user_id)
    }

    pub fn cart_validation(user_id: impl Display) -> String {
        format!("cart:{}:validation", user_id)
    }

    pub fn cart_item(user_id: impl Display, product_id: impl Display) -> String {
        format!("cart:{}:item:{}", user_id, product_id)
    }

    // Farms

    pub fn farm(farm_id: impl Display) -> String {
        format!("farm:{}:details", farm_id)
    }

    pub fn farm_by_slug(slug: impl Display) -> String {
        format!("farm:slug:{}", slug)
    }

    pub fn farms_list(page: u32, limit: u32) -> String {
        format!("farms:list:page:{}:limit:{}", page, limit)
    }

    pub fn farms_by_owner(owner_id: impl Display) -> String {
        format!("farms:owner:{}", owner_id)
    }

    pub fn farm_stats(farm_id: impl Display) -> String {
        format!("farm:{}:stats", farm_id)
    }

    // Products

    pub fn product(product_id: impl Display) -> String {
        format!("product:{}:details", product_id)
    }

    pub fn product_by_slug(slug: impl Display) -> String {
        format!("product:slug:{}", slug)
    }

    pub fn products_by_farm(farm_id: impl Display, page: u32, limit: u32) -> String {
        format!("products:farm:{}:page:{}:limit:{}", farm_id, page, limit)
    }

    pub fn products_search(query: impl Display, page: u32) -> String {
        format!("products:search:{}:page:{}", query, page)
    }

    pub fn product_inventory(product_id: impl Display) -> String {
        format!("product:{}:inventory", product_id)
    }

    pub fn products_by_category(category: impl Display, page: u32) -> String {
        format!("products:category:{}:page:{}", category, page)
    }

    // Orders

    pub fn order(order_id: impl Display) -> String {
        format!("order:{}:details", order_id)
    }

    pub fn orders_by_user(user_id: impl Display, page: u32, limit: u32) -> String {
        format!("orders:user:{}:page:{}:limit:{}", user_id, page, limit)
    }

    pub fn orders_by_farm(farm_id: impl Display, page: u32, limit: u32) -> String {
        format!("orders:farm:{}:page:{}:limit:{}", farm_id, page, limit)
    }

    pub fn order_stats(user_id: impl Display) -> String {
        format!("orders:user:{}:stats", user_id)
    }

    pub fn order_status(order_id: impl Display) -> String {
        format!("order:{}:status", order_id)
    }

    pub fn recent_orders(limit: u32) -> String {
        format!("orders:recent:limit:{}", limit)
    }

    // Users

    pub fn user_profile(user_id: impl Display) -> String {
        format!("user:{}:profile", user_id)
    }

    pub fn user_preferences(user_id: impl Display) -> String {
        format!("user:{}:preferences", user_id)
    }

    pub fn user_by_email(email: impl Display) -> String {
        format!("user:email:{}", email)
    }

    pub fn user_favorites(user_id: impl Display) -> String {
        format!("user:{}:favorites", user_id)
    }
}

/// Invalidation globs matching groups of [`CacheKeys`]
pub struct CachePatterns;

impl CachePatterns {
    pub fn user_cart(user_id: impl Display) -> String {
        format!("cart:{}:*", user_id)
    }

    pub fn farm(farm_id: impl Display) -> String {
        format!("farm:{}:*", farm_id)
    }

    pub fn farm_products(farm_id: impl Display) -> String {
        format!("products:farm:{}:*", farm_id)
    }

    pub fn user_orders(user_id: impl Display) -> String {
        format!("orders:user:{}:*", user_id)
    }

    pub fn farm_orders(farm_id: impl Display) -> String {
        format!("orders:farm:{}:*", farm_id)
    }

    pub fn product(product_id: impl Display) -> String {
        format!("product:{}:*", product_id)
    }
}

/// TTL presets
pub struct CacheTtl;

impl CacheTtl {
    pub const SHORT: Duration = Duration::from_secs(60);
    pub const MEDIUM: Duration = Duration::from_secs(300);
    pub const LONG: Duration = Duration::from_secs(3_600);
    pub const DAY: Duration = Duration::from_secs(86_400);
}
