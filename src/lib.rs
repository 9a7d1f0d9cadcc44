//! # Restaurant Offline Core
//!
//! Offline-first storage and sync core for the restaurant directory page,
//! built on LMDB and exposed through C-compatible functions so any UI shell
//! (web view, Flutter, native) can drive it.
//!
//! ## Features
//!
//! - **Versioned local store**: `main-reviews`, `offline-reviews` and
//!   `fav-restaurants` partitions, created on first open or schema bump
//! - **Review submission**: posted and mirrored when online, queued with an
//!   atomically assigned sequence id when offline
//! - **Favorites**: remote PUT mirrored locally, no-op while offline
//! - **Offline replay**: FIFO replay of queued reviews with retry/backoff
//! - **Static asset cache**: install-once, all-or-nothing, cache-first
//!
//! ## Quick Start
//!
//! ```no_run
//! use restaurant_offline_core::{create_db, submit_review, set_online};
//! use std::ffi::CString;
//!
//! let db_name = CString::new("restaurant-db").unwrap();
//! let app = create_db(db_name.as_ptr());
//!
//! set_online(app, false);
//! let form = CString::new(r#"{"restaurant_id":3,"name":"Ana","rating":"5","comments":"Great"}"#).unwrap();
//! let result = submit_review(app, form.as_ptr());
//! ```
//!
//! ## FFI Functions
//!
//! Every function returning `*const c_char` returns a JSON [`AppResponse`]
//! envelope which must be released with [`free_response`].
//!
//! - [`create_db`] / [`create_db_with_config`] - Open the store and HTTP client
//! - [`set_online`] - Report a connectivity change
//! - [`submit_review`] - Validate, post or queue a review
//! - [`add_to_favorites`] - Mark a restaurant as favorite
//! - [`get_restaurant_view`] - Reviews, queued reviews and favorite flag
//! - [`flush_offline_reviews`] - Replay the offline queue
//! - [`clear_all_records`] - Empty every partition
//! - [`close_database`] - Sync and release the store
//! - [`open_asset_cache`], [`install_asset_cache`], [`respond_asset`],
//!   [`close_asset_cache`] - Static asset cache

pub mod app_config;
pub mod app_state;
pub mod asset_cache;
pub mod connectivity;
pub mod favorite_flow;
pub mod local_db_model;
pub mod local_db_partition;
pub mod local_db_state;
pub mod offline_sync;
pub mod page_session;
pub mod remote_api;
pub mod review_flow;
pub mod app_response;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;

use log::{info, warn};

pub use crate::app_response::AppResponse;
use crate::app_config::AppConfig;
use crate::app_state::{AssetWorker, RestaurantApp, SubmitReviewRequest};

/// Opens the store `<name>.lmdb` with the default configuration.
///
/// # Returns
///
/// A pointer to the [`RestaurantApp`] on success, or null on failure. The
/// host treats a null handle as "no offline storage" and skips writes.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use restaurant_offline_core::create_db;
///
/// let name = CString::new("restaurant-db").unwrap();
/// let app = create_db(name.as_ptr());
///
/// if !app.is_null() {
///     // Store opened successfully
/// }
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_db(name: *const c_char) -> *mut RestaurantApp {
    if name.is_null() {
        warn!("Null name pointer passed to create_db");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let config = AppConfig {
        db_name: name_str.to_string(),
        ..AppConfig::default()
    };
    init_app(config)
}

/// Opens the store described by a JSON [`AppConfig`]. Missing fields take
/// their defaults, so `{}` is accepted.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_db_with_config(config_ptr: *const c_char) -> *mut RestaurantApp {
    let json = match c_str_arg(config_ptr) {
        Some(s) => s,
        None => {
            warn!("Null or invalid config pointer passed to create_db_with_config");
            return std::ptr::null_mut();
        }
    };

    match AppConfig::from_json_str(json) {
        Ok(config) => init_app(config),
        Err(e) => {
            warn!("Rejected configuration: {e}");
            std::ptr::null_mut()
        }
    }
}

fn init_app(config: AppConfig) -> *mut RestaurantApp {
    let db_name = config.db_name.clone();
    match RestaurantApp::init(config) {
        Ok(app) => {
            info!("✅ Store '{db_name}' initialized successfully");
            Box::into_raw(Box::new(app))
        }
        Err(e) => {
            warn!("❌ Failed to initialize store '{db_name}': {e}");
            std::ptr::null_mut()
        }
    }
}

/// Records the host's connectivity signal.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn set_online(state: *mut RestaurantApp, online: bool) -> *const c_char {
    let app = match app_ref(state, "set_online") {
        Ok(app) => app,
        Err(err) => return err,
    };
    app.network.set_online(online);
    response_to_c_string(&AppResponse::success(if online { "online" } else { "offline" }))
}

/// Submits a review.
///
/// # JSON Format
///
/// ```json
/// { "restaurant_id": 3, "name": "Ana", "rating": "5", "comments": "Great" }
/// ```
///
/// On success the `Ok` payload holds `{"outcome": ..., "view": ...}` where the
/// outcome is `posted` or `queued`. Empty fields yield a `ValidationError`
/// with "All fields are required".
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn submit_review(state: *mut RestaurantApp, json_ptr: *const c_char) -> *const c_char {
    let app = match app_ref(state, "submit_review") {
        Ok(app) => app,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let request: SubmitReviewRequest = match serde_json::from_str(&json_str) {
        Ok(r) => r,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    match app.submit_review(request) {
        Ok(reply) => response_to_c_string(&AppResponse::json(&reply)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Marks `restaurant_id` as favorite. Offline this reports `skipped_offline`
/// and changes nothing.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_to_favorites(state: *mut RestaurantApp, restaurant_id: u64) -> *const c_char {
    let app = match app_ref(state, "add_to_favorites") {
        Ok(app) => app,
        Err(err) => return err,
    };

    match app.add_to_favorites(restaurant_id) {
        Ok(reply) => response_to_c_string(&AppResponse::json(&reply)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Returns the stored reviews, queued reviews and favorite flag of a restaurant.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_restaurant_view(state: *mut RestaurantApp, restaurant_id: u64) -> *const c_char {
    let app = match app_ref(state, "get_restaurant_view") {
        Ok(app) => app,
        Err(err) => return err,
    };

    match app.view(restaurant_id) {
        Ok(view) => response_to_c_string(&AppResponse::json(&view)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Replays queued reviews in FIFO order. The payload is a flush report.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn flush_offline_reviews(state: *mut RestaurantApp) -> *const c_char {
    let app = match app_ref(state, "flush_offline_reviews") {
        Ok(app) => app,
        Err(err) => return err,
    };

    match app.flush_offline() {
        Ok(report) => response_to_c_string(&AppResponse::json(&report)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Clears every partition while keeping the store open.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_all_records(state: *mut RestaurantApp) -> *const c_char {
    let app = match app_ref(state, "clear_all_records") {
        Ok(app) => app,
        Err(err) => return err,
    };

    match app.db.clear_all_records() {
        Ok(count) => response_to_c_string(&AppResponse::success(format!("{count} record(s) cleared"))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Syncs the store to disk and releases the handle.
///
/// # Safety
///
/// `state` must come from [`create_db`] or [`create_db_with_config`] and must
/// not be used after this call.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_database(state: *mut RestaurantApp) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_database".to_string());
        return response_to_c_string(&error);
    }

    let app = unsafe { Box::from_raw(state) };
    let result = app.db.close_database();
    drop(app);

    match result {
        Ok(()) => response_to_c_string(&AppResponse::success("Database connection closed successfully")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Opens the asset cache bucket under `dir` using a JSON [`AppConfig`]
/// (`cache_bucket`, `asset_base_url`, `asset_manifest`). A null config uses
/// the defaults.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn open_asset_cache(dir: *const c_char, config_ptr: *const c_char) -> *mut AssetWorker {
    let dir = match c_str_arg(dir) {
        Some(d) => PathBuf::from(d),
        None => {
            warn!("Null or invalid dir pointer passed to open_asset_cache");
            return std::ptr::null_mut();
        }
    };

    let config = if config_ptr.is_null() {
        AppConfig::default()
    } else {
        match c_str_arg(config_ptr).map(AppConfig::from_json_str) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                warn!("Rejected asset cache configuration: {e}");
                return std::ptr::null_mut();
            }
            None => {
                warn!("Invalid UTF-8 in asset cache configuration");
                return std::ptr::null_mut();
            }
        }
    };

    match AssetWorker::init(dir, &config) {
        Ok(worker) => Box::into_raw(Box::new(worker)),
        Err(e) => {
            warn!("❌ Failed to open asset cache: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Installs the manifest into the bucket; all entries or none.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn install_asset_cache(worker: *mut AssetWorker) -> *const c_char {
    let worker = match unsafe { worker.as_mut() } {
        Some(w) => w,
        None => {
            let error = AppResponse::BadRequest("Null cache pointer passed to install_asset_cache".to_string());
            return response_to_c_string(&error);
        }
    };

    match worker.install() {
        Ok(count) => response_to_c_string(&AppResponse::success(format!("{count} asset(s) cached"))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Answers a request for `path`, from the cache when possible.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn respond_asset(worker: *mut AssetWorker, path_ptr: *const c_char) -> *const c_char {
    let worker = match unsafe { worker.as_ref() } {
        Some(w) => w,
        None => {
            let error = AppResponse::BadRequest("Null cache pointer passed to respond_asset".to_string());
            return response_to_c_string(&error);
        }
    };

    let path = match c_ptr_to_string(path_ptr, "path") {
        Ok(path) => path,
        Err(err) => return err,
    };

    match worker.respond(&path) {
        Ok(response) => response_to_c_string(&AppResponse::json(&response)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Releases an asset cache handle.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_asset_cache(worker: *mut AssetWorker) {
    if !worker.is_null() {
        drop(unsafe { Box::from_raw(worker) });
    }
}

/// Frees a string returned by any function of this library.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr as *mut c_char) });
    }
}

fn app_ref<'a>(state: *mut RestaurantApp, caller: &str) -> Result<&'a RestaurantApp, *const c_char> {
    match unsafe { state.as_ref() } {
        Some(app) => Ok(app),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn c_str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Serializes a response into a heap C string owned by the caller.
///
/// Returns null if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to an owned `String`, or to an error envelope.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
