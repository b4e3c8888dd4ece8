//! Request handlers: the local sink (answers are built in-process) and
//! the HTTP handler that ships a tidy JSON projection of the request
//! to an external service and expects a JSON answer projection back
//! (spec.md §6).
use crate::avp::Avp;
use crate::dictionary::Dictionary;
use crate::diameter::DiameterMessage;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An HTTP/2 handler backed by a single keep-alive client. `verify_cert`
/// is always disabled: handlers run behind an operator-controlled
/// network boundary, not a public one.
#[derive(Clone)]
pub struct HttpHandler {
    client: reqwest::Client,
    url: String,
    dict: Arc<Dictionary>,
}

impl HttpHandler {
    pub fn new(url: impl Into<String>, dict: Arc<Dictionary>) -> Result<HttpHandler> {
        let client = reqwest::Client::builder()
            .http2_prior_knowledge()
            .danger_accept_invalid_certs(true)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::HandlerError(e.to_string()))?;
        Ok(HttpHandler {
            client,
            url: url.into(),
            dict,
        })
    }

    pub async fn handle(&self, req: &DiameterMessage) -> Result<DiameterMessage> {
        let body = req.tidy(&self.dict);
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::HandlerError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::HandlerError(format!(
                "handler {} returned status {}",
                self.url,
                resp.status()
            )));
        }

        let projection: AnswerProjection = resp
            .json()
            .await
            .map_err(|e| Error::HandlerError(e.to_string()))?;

        let mut answer = DiameterMessage::new_answer(req);
        for (name, value) in projection.avps {
            let avp = Avp::by_name_json(&self.dict, &name, value)
                .map_err(|e| Error::HandlerError(e.to_string()))?;
            answer.add_avp(avp);
        }
        Ok(answer)
    }
}

#[derive(serde::Deserialize)]
struct AnswerProjection {
    avps: Vec<(String, serde_json::Value)>,
}

/// A handler implemented in-process: no network round trip, just a
/// closure over the request.
pub trait LocalHandler: Send + Sync {
    fn handle(&self, req: &DiameterMessage) -> Result<DiameterMessage>;
}

impl<F> LocalHandler for F
where
    F: Fn(&DiameterMessage) -> Result<DiameterMessage> + Send + Sync,
{
    fn handle(&self, req: &DiameterMessage) -> Result<DiameterMessage> {
        self(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diameter::CommandFlags;

    #[test]
    fn test_local_handler_closure() {
        let handler = |req: &DiameterMessage| Ok(DiameterMessage::new_answer(req));
        let req = DiameterMessage::new(257, 0, CommandFlags::default(), 1, 1);
        let answer = handler.handle(&req).unwrap();
        assert_eq!(answer.header.code, 257);
        assert!(!answer.header.flags.request);
    }
}
