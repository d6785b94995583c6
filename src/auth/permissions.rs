/*!
 * # Permissions Module
 *
 * Permission strings carried in access tokens, in `resource:action` form.
 */

/// Common permission string constants for compile-time safety
pub mod consts {
    // Catalog
    pub const CATALOG_MANAGE: &str = "catalog:manage";

    // Purchases
    pub const PURCHASES_ADMIN: &str = "purchases:admin";

    // Comments
    pub const COMMENTS_MODERATE: &str = "comments:moderate";
}

/// Role names
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const CUSTOMER: &str = "customer";
}
