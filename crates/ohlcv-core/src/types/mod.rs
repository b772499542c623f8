//! 도메인 타입 정의.

pub mod candle;
pub mod fingerprint;
pub mod range;
pub mod series;
pub mod timeframe;

pub use candle::*;
pub use fingerprint::*;
pub use range::*;
pub use series::*;
pub use timeframe::*;
