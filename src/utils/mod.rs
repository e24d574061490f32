pub mod user_locks;
