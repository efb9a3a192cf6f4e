use clap::Parser;
use recolor_core::{BackendKind, StoreConfig};
use wasm_bindgen::prelude::*;

mod handle;
mod storage;

pub use handle::*;
pub use storage::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// What log level to use
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    /// How many times a storage operation is attempted
    #[arg(long, default_value_t = StoreConfig::default().max_retries)]
    max_retries: u32,

    /// Storage ceiling of each namespace, in bytes
    #[arg(long, default_value_t = StoreConfig::default().max_storage_size_bytes)]
    max_storage_bytes: usize,

    /// Map to open on start
    #[arg(long)]
    map: Option<String>,
}

impl Args {
    /// Arguments from the page's location hash, e.g. `#-vv&--max-retries=5`.
    fn from_location() -> Self {
        let location_hash = gloo::utils::window()
            .location()
            .hash()
            .unwrap_or_default();
        Self::try_parse_from(location_hash.split(['#', '&'])).unwrap_or_else(|err| {
            log::warn!("ignoring location arguments: {err}");
            Self::parse_from([env!("CARGO_PKG_NAME")])
        })
    }

    fn store_config(&self, backend: BackendKind) -> StoreConfig {
        StoreConfig {
            backend,
            max_retries: self.max_retries,
            max_storage_size_bytes: self.max_storage_bytes,
        }
    }
}

#[wasm_bindgen(start)]
pub fn run_app() {
    #[cfg(feature = "console_error_panic_hook")]
    {
        console_error_panic_hook::set_once();
    }

    let args = Args::from_location();
    if let Some(log_level) = args.verbose.log_level() {
        if let Err(err) = console_log::init_with_level(log_level) {
            web_sys::console::error_1(&format!("Error initializing logger: {err}").into());
        }
    }
    log::debug!("store config: {:?}", args.store_config(BackendKind::Persistent));
    log::debug!("map: {:?}", args.map);

    let persistence = handle::web_persistence(&args);
    wasm_bindgen_futures::spawn_local(async move {
        if persistence.run_cleanup_if_due().await.is_none() {
            log::debug!("storage cleanup not due yet");
        }
    });
}

/// Map id requested through the location hash.
#[wasm_bindgen]
pub fn requested_map() -> Option<String> {
    Args::from_location().map
}
