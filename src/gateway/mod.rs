/*
 * Responsibility
 * - gateway の中核 (RouteTable / Front Door / Forwarding Proxy) の公開インターフェース
 */
pub mod front_door;
pub mod proxy;
pub mod route_table;

pub use front_door::front_door;
pub use proxy::{ForwardRequest, Forwarder, HttpForwarder, ProxyError};
pub use route_table::{BackendTarget, RouteTable, RouteTableError, default_rules};
