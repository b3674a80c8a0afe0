//! REST client for a remote broadcast-log server.

use crate::*;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP shim over the two log URIs. Unparseable log entries are
/// skipped on ingestion; semantically invalid ones are kept, since semantic
/// validation belongs to the election state machine.
pub struct BroadcastClient {
    client: reqwest::blocking::Client,
    id: ElectionId,
    params_uri: String,
    messages_uri: String,
}

impl BroadcastClient {
    pub fn new(address: &str, server: &str) -> Result<Self> {
        if address.is_empty() {
            return Err(Error::InvalidAddress);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        let base = server.trim_end_matches('/');
        Ok(BroadcastClient {
            client,
            id: hash(address.as_bytes()),
            params_uri: format!("{}/params/{}", base, address),
            messages_uri: format!("{}/messages/{}", base, address),
        })
    }

    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(uri).send()?;
        if !resp.status().is_success() {
            return Err(Error::Server {
                status: resp.status().as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }
        Ok(resp.bytes()?.to_vec())
    }
}

impl BroadcastChannel for BroadcastClient {
    fn id(&self) -> ElectionId {
        self.id
    }

    fn params(&self, ctx: &Ctx) -> Result<ElectionParams> {
        ctx.check()?;
        ElectionParams::from_bytes(&self.fetch(&self.params_uri)?)
    }

    fn get(&self, ctx: &Ctx) -> Result<Vec<Message>> {
        ctx.check()?;
        let buf = self.fetch(&self.messages_uri)?;
        let mut r = BufferReader::new(&buf);
        let mut messages = Vec::new();
        while r.len() != 0 {
            let item = r.read_vector()?;
            match Message::from_bytes(item) {
                Ok(m) => messages.push(m),
                Err(err) => log::debug!("skipping unparseable broadcast message: {}", err),
            }
        }
        Ok(messages)
    }

    fn post(&self, ctx: &Ctx, m: Message) -> Result<()> {
        ctx.check()?;
        let resp = self
            .client
            .post(&self.messages_uri)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(m.bytes())
            .send()?;
        if !resp.status().is_success() {
            return Err(Error::Server {
                status: resp.status().as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}
