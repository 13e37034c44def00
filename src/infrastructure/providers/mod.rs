pub mod bocha;
pub mod deepseek;
pub mod doubao;
pub mod hosted_chat;
pub mod registry;

pub use bocha::BochaProvider;
pub use deepseek::DeepSeekChatDriver;
pub use doubao::DoubaoChatDriver;
pub use hosted_chat::{ChatDriver, HostedChatProvider};
pub use registry::ProviderRegistry;
