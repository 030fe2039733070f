//! Shared fixture for store tests: a file-backed database with one user per
//! role and a single product.

use redeem_shared::types::Role;
use tempfile::TempDir;

use crate::database::Database;
use crate::models::{NewProduct, NewUser, Order, Product, User};

pub(crate) struct Fixture {
    pub db: Database,
    pub admin: User,
    pub staff: User,
    pub customer: User,
    /// A second customer that owns nothing.
    pub other: User,
    pub product: Product,
    _dir: TempDir,
}

impl Fixture {
    /// File-backed so concurrency tests can open extra connections.
    pub fn new(stock: i64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_at(&dir.path().join("redeem.db")).unwrap();

        let user = |db: &Database, email: &str, name: &str, role| {
            db.create_user(&NewUser {
                email: email.into(),
                name: name.into(),
                role,
            })
            .unwrap()
            .0
        };
        let admin = user(&db, "admin@example.com", "Admin", Role::Admin);
        let staff = user(&db, "staff@example.com", "Staff", Role::Staff);
        let customer = user(&db, "buyer@example.com", "Buyer", Role::Customer);
        let other = user(&db, "other@example.com", "Other", Role::Customer);

        let product = db
            .create_product(
                &NewProduct {
                    name: "Steam Wallet 50k".into(),
                    description: "Digital voucher".into(),
                    price: 50_000,
                    initial_stock: stock,
                },
                admin.id,
            )
            .unwrap();

        Self {
            db,
            admin,
            staff,
            customer,
            other,
            product,
            _dir: dir,
        }
    }

    /// Place an order for the fixture customer.
    pub fn pending_order(&mut self, quantity: i64) -> Order {
        self.db
            .create_order(self.customer.id, self.product.id, quantity)
            .unwrap()
            .0
    }
}
