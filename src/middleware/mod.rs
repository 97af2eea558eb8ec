/*
 * Responsibility
 * - middleware の公開インターフェース
 * - Router 全体に掛ける横断的関心事 (request-id, trace, limit, timeout, CORS, security header)
 */
pub mod cors;
pub mod http;
pub mod security_headers;
