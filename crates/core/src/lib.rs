//! Front desk agent core: the event model, the live request queue, the
//! session registry, and the agent runtimes the gateway drives.

pub mod event;
pub mod queue;
pub mod runtime;
pub mod session;
pub mod toolbox;

pub use event::{ActionResult, AgentEvent, Blob, Content, Part, Transcription};
pub use queue::{LiveRequest, LiveRequestQueue, LiveRequestReceiver, QueueError};
pub use runtime::{AgentRuntime, EventStream};
pub use session::{InMemorySessionService, Session, SessionHandle, SessionKey, SessionService};
