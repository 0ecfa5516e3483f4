//! HTTP route handlers for the bookstore API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/signup                 - Create a customer account
//! POST   /api/auth/login                  - Exchange credentials for a token
//! POST   /api/auth/logout                 - Drop the session (client discards token)
//! GET    /api/auth/me                     - Current user
//!
//! # Catalog
//! GET    /api/books                       - Paged listing
//! GET    /api/books/search?query=         - Title/author/ISBN search
//! GET    /api/books/isbn/check?isbn=      - ISBN validity and availability
//! GET    /api/books/{id}                  - Book detail
//! POST   /api/books                       - Create (admin)
//! PATCH  /api/books/{id}                  - Update (admin)
//! DELETE /api/books/{id}                  - Delete (admin)
//! PATCH  /api/books/{id}/stock?delta=     - Adjust stock (admin)
//! GET    /api/authors                     - All authors
//! GET    /api/authors/search?name=        - Name search
//! GET    /api/authors/{id}                - Author detail
//! POST   /api/authors                     - Create or fetch (admin)
//!
//! # Cart
//! GET    /api/cart                        - Open bag
//! PATCH  /api/cart/add                    - Add a quantity of a book
//! PATCH  /api/cart/remove                 - Remove a quantity of a book
//! POST   /api/cart/edit                   - Overwrite quantities
//! DELETE /api/cart/items/{itemId}         - Drop one line
//! DELETE /api/cart                        - Empty the bag
//!
//! # Orders
//! POST   /api/checkout                    - Turn the bag into an order
//! GET    /api/orders                      - Caller's orders
//! GET    /api/orders/{orderNumber}        - One order
//! POST   /api/orders/{orderNumber}/cancel - Cancel a PROCESSING order
//! GET    /api/profile                     - Addresses and order history
//!
//! # Admin
//! GET    /api/admin/orders                - Every order
//! PATCH  /api/admin/orders/{orderNumber}  - Change status
//! GET    /api/admin/dashboard             - Stats, low stock, recent activity
//! GET    /api/admin/dashboard/low-stock   - Low-stock report
//! GET    /api/admin/stock-alerts          - Live low-stock alerts (SSE)
//!
//! # Legacy paths (same handlers as above)
//! POST   /user/signup, /user/login
//! GET    /books, /books/{id}
//! POST   /books                           - Create (admin)
//! PATCH  /books/{id}, DELETE /books/{id}  - Update, delete (admin)
//! PATCH  /shop/add, /shop/remove
//! POST   /order/checkout
//! GET    /order                           - Every order (admin)
//! GET    /order/{orderNumber}             - One order (owner or admin)
//! PATCH  /order/{orderNumber}             - Change status (admin)
//! ```

pub mod admin;
pub mod auth;
pub mod authors;
pub mod books;
pub mod cart;
pub mod checkout;
pub mod orders;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Signup and login, rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the book routes router.
pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(books::list).post(books::create))
        .route("/search", get(books::search))
        .route("/isbn/check", get(books::check_isbn))
        .route(
            "/{id}",
            get(books::show).patch(books::update).delete(books::delete),
        )
        .route("/{id}/stock", patch(books::adjust_stock))
}

/// Create the author routes router.
pub fn author_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(authors::list).post(authors::create))
        .route("/search", get(authors::search))
        .route("/{id}", get(authors::show))
}

/// Cart writes are rate limited; reads are not.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/add", patch(cart::add))
        .route("/remove", patch(cart::remove))
        .route("/edit", post(cart::edit))
        .route("/items/{item_id}", delete(cart::delete_item))
        .layer(api_rate_limiter())
        .route("/", get(cart::show).delete(cart::clear))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(admin::orders))
        .route("/orders/{order_number}", patch(admin::update_order))
        .route("/dashboard", get(admin::dashboard))
        .route("/dashboard/low-stock", get(admin::low_stock))
        .route("/stock-alerts", get(admin::stock_alerts))
}

/// Paths kept for clients of the first API version.
pub fn legacy_routes() -> Router<AppState> {
    let auth = Router::new()
        .route("/user/signup", post(auth::signup))
        .route("/user/login", post(auth::login))
        .layer(auth_rate_limiter());

    let shop = Router::new()
        .route("/shop/add", patch(cart::add))
        .route("/shop/remove", patch(cart::remove))
        .route("/order/checkout", post(checkout::checkout))
        .layer(api_rate_limiter());

    let records = Router::new()
        .route("/books", get(books::list).post(books::create))
        .route(
            "/books/{id}",
            get(books::show).patch(books::update).delete(books::delete),
        )
        .route("/order", get(admin::orders))
        .route(
            "/order/{order_number}",
            get(orders::show).patch(admin::update_order),
        );

    auth.merge(shop).merge(records)
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/books", book_routes())
        .nest("/authors", author_routes())
        .nest("/cart", cart_routes())
        .route(
            "/checkout",
            post(checkout::checkout).layer(api_rate_limiter()),
        )
        .route("/orders", get(orders::list))
        .route("/orders/{order_number}", get(orders::show))
        .route("/orders/{order_number}/cancel", post(orders::cancel))
        .route("/profile", get(orders::profile))
        .nest("/admin", admin_routes());

    Router::new()
        .nest("/api", api)
        .merge(legacy_routes())
}
