use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        accounts::AccountService, cart::CartService, catalog::CatalogService,
        checkout::CheckoutService, mailer::Mailer, media::MediaStore, purchases::PurchaseService,
    },
};

pub mod accounts;
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod common;
pub mod health;
pub mod purchases;

pub use crate::AppState;

/// Services shared by every handler through `AppState`
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub accounts: Arc<AccountService>,
    pub purchases: Arc<PurchaseService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        mailer: Arc<dyn Mailer>,
        media: Arc<dyn MediaStore>,
        config: &AppConfig,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.catalog_page_size,
        ));
        let cart = Arc::new(CartService::new(db_pool.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(db_pool.clone(), event_sender.clone()));
        let accounts = Arc::new(AccountService::new(
            db_pool.clone(),
            event_sender.clone(),
            mailer,
            media,
            config,
        ));
        let purchases = Arc::new(PurchaseService::new(db_pool, event_sender));

        Self {
            catalog,
            cart,
            checkout,
            accounts,
            purchases,
        }
    }
}
