use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        addresses::{AddressList, CreateAddressRequest, UpdateAddressRequest},
        admin::{
            AdjustStockRequest, AnalyticsSummary, BulkDeleteProductsRequest, BulkOperationResult,
            BulkProductChanges, BulkUpdateProductsRequest, RecentOrder, SalesAnalytics, TopProduct,
            UpdateOrderStatusRequest,
        },
        auth::{LoginRequest, LoginResponse, RegisterRequest, ResendVerificationRequest},
        cart::{AddToCartRequest, CartList, UpdateCartItemRequest},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        favorites::{AddFavoriteRequest, FavoriteCheck, FavoriteCount, FavoriteProductList},
        orders::{CheckoutRequest, CreateOrderRequest, OrderList, OrderWithItems},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, HelpfulResponse, RatingSummary, ReviewDto, ReviewList},
        upload::UploadedImageList,
    },
    images::UploadedImage,
    models::{Address, CartItem, Category, Order, OrderItem, Product, User},
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, categories, customer_auth, favorites, health, orders,
        products as product_routes, reviews, upload,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::me,
        customer_auth::register,
        customer_auth::login,
        customer_auth::verify_email,
        customer_auth::resend_verification,
        customer_auth::me,
        product_routes::list_products,
        product_routes::get_product,
        product_routes::create_product,
        product_routes::update_product,
        product_routes::delete_product,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::list_orders,
        orders::get_order,
        orders::create_order,
        orders::checkout,
        reviews::list_reviews,
        reviews::create_review,
        reviews::mark_helpful,
        reviews::delete_review,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        favorites::check_favorite,
        favorites::favorite_count,
        addresses::list_addresses,
        addresses::create_address,
        addresses::update_address,
        addresses::set_default_address,
        addresses::delete_address,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::approve_order,
        admin::reject_order,
        admin::update_order_status,
        admin::bulk_update_products,
        admin::bulk_delete_products,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::analytics,
        admin::sales_analytics,
        upload::upload_image,
        upload::upload_images,
        upload::delete_image
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            CartItem,
            Address,
            Order,
            OrderItem,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ResendVerificationRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartList,
            CreateOrderRequest,
            CheckoutRequest,
            OrderList,
            OrderWithItems,
            CreateReviewRequest,
            ReviewDto,
            ReviewList,
            RatingSummary,
            HelpfulResponse,
            AddFavoriteRequest,
            FavoriteProductList,
            FavoriteCheck,
            FavoriteCount,
            AddressList,
            CreateAddressRequest,
            UpdateAddressRequest,
            UpdateOrderStatusRequest,
            AdjustStockRequest,
            AnalyticsSummary,
            BulkProductChanges,
            BulkUpdateProductsRequest,
            BulkDeleteProductsRequest,
            BulkOperationResult,
            SalesAnalytics,
            RecentOrder,
            TopProduct,
            UploadedImage,
            UploadedImageList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<ReviewList>,
            ApiResponse<AddressList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Admin authentication"),
        (name = "CustomerAuth", description = "Customer signup, login and email verification"),
        (name = "Products", description = "Product catalog"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Addresses", description = "Address book"),
        (name = "Admin", description = "Order approval, inventory and analytics"),
        (name = "Upload", description = "Image uploads"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
