pub mod dom_fallback;
pub mod interceptor;
pub mod session;

pub use interceptor::StreamInterceptor;
pub use session::BrowserSession;
