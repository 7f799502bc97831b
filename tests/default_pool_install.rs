//! Installing a custom default pool before first use.

use std::sync::Arc;
use std::time::Duration;
use taskweave::executor::{ThreadPool, default_thread_pool, set_default_thread_pool};

#[test]
fn an_installed_pool_is_the_one_observed() {
    let pool = Arc::new(ThreadPool::new(1, 2, Duration::from_millis(50)));
    set_default_thread_pool(Arc::clone(&pool));
    assert!(Arc::ptr_eq(&pool, &default_thread_pool()));
}
