/// Blockchain communication module
/// Handles RPC calls to kaspad and the block template data model

pub mod rpc_client;
pub mod template;
pub mod wrpc_client;

pub use rpc_client::{node_source, FetchError, KaspadRpcClient, TemplateSource};
pub use template::{BlockTemplate, TemplateSummary};
pub use wrpc_client::KaspadWrpcClient;
