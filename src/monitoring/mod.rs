/*!
 * Monitoring
 * Structured logging setup for hosts of the memory manager
 */

mod tracer;

pub use tracer::{init_tracing, ENV_TRACE_JSON};
