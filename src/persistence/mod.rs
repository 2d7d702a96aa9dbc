pub mod store;

pub use store::{
    decode_forecast, encode_forecast, load_forecast, save_forecast, FileStore, ForecastStore,
    MemoryStore, StoreError,
};
