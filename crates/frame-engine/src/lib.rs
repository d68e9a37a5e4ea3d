mod backend;
mod builder;
mod config;
mod error;
mod flow;
mod gateway;
mod http;
mod routing;
mod store;
mod supabase;
mod vendor;

pub use backend::{BackendClient, BackendEnhancement};
pub use builder::{RequestBuilder, FACE_PRESERVATION_SUFFIX};
pub use config::{
    FrameConfig, DEFAULT_DEMO_DELAY, DEFAULT_HTTP_TIMEOUT, DEFAULT_VENDOR_ENDPOINT,
};
pub use error::{EnhanceError, FlowError};
pub use flow::{AttemptState, EnhancedImage, FlowController, ResetTarget, Screen};
pub use gateway::{EnhancementGateway, EnhancementResult, GatewayContext, GatewayOutcome};
pub use routing::{select_path, EnhancementPath, PathFlags, PathSelection};
pub use store::{object_path, ImageStore, MemoryImageStore, StoreError};
pub use supabase::SupabaseStore;
pub use vendor::{extract_image_reference, VendorClient};
