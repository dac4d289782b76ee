//! Adapts a model token stream into plain-text fragments for the transport
//!
//! Errors are reported in-band: the first upstream error becomes a final
//! `[ERROR] ...` fragment and the stream ends there.

use futures::stream::{self, BoxStream, StreamExt};

use crate::server::services::generation::TokenStream;

/// Prefix marking a fragment that reports a failure
pub const ERROR_PREFIX: &str = "[ERROR]";

/// Text fragments ready to be written to the client
pub type FragmentStream = BoxStream<'static, String>;

/// Render an error as the single fragment a client will see
pub fn error_fragment(message: impl std::fmt::Display) -> String {
  format!("{ERROR_PREFIX} {message}")
}

/// A stream holding exactly one error fragment
pub fn error_stream(message: impl std::fmt::Display) -> FragmentStream {
  stream::once(futures::future::ready(error_fragment(message))).boxed()
}

/// Forward model fragments as they arrive, ending with an error fragment on failure.
///
/// Dropping the returned stream drops `tokens`, which abandons generation.
pub fn fragments(tokens: TokenStream) -> FragmentStream {
  stream::unfold(Some(tokens), |state| async move {
    let mut tokens = state?;
    loop {
      match tokens.next().await {
        Some(Ok(fragment)) if fragment.is_empty() => continue,
        Some(Ok(fragment)) => return Some((fragment, Some(tokens))),
        Some(Err(e)) => {
          tracing::warn!("model stream failed mid-answer: {e}");
          return Some((error_fragment(e), None));
        }
        None => return None,
      }
    }
  })
  .boxed()
}
