//! Session records.
//!
//! Every getter is one store read and every setter at least one store write;
//! nothing is cached on the [`Session`] handle. Field setters first bump
//! `last_changed` and then write the value as two separate commands, so a
//! reader can briefly see one without the other. Use [`Session::apply`] when
//! several fields and the timestamp must land together.

use std::{collections::HashMap, fmt, sync::Arc};

use {
    chrono::{DateTime, Utc},
    crispy_store::KvStore,
    serde::Serialize,
    serde_json::{Value, json},
    tracing::debug,
};

use crate::{
    clock::{Clock, SystemClock},
    codec,
    error::{Error, Result},
    ids::{IdSource, RandomIds},
    keys::SessionId,
};

/// Hash field names as stored. External tooling reads these directly.
pub mod field {
    pub const STATE: &str = "state";
    pub const ERROR: &str = "error";
    pub const ASID: &str = "asid";
    pub const FILENAME: &str = "filename";
    pub const ADDED: &str = "added";
    pub const LAST_CHANGED: &str = "last_changed";
    pub const GENOME: &str = "genome";
    pub const REGION: &str = "region";
    pub const FROM: &str = "from";
    pub const TO: &str = "to";
    pub const DERIVED: &str = "derived";
    pub const PAM: &str = "pam";
    pub const UNIQ_SIZE: &str = "uniq_size";
    pub const FULL_SIZE: &str = "full_size";
    pub const BEST_SIZE: &str = "best_size";
    pub const BEST_OFFSET: &str = "best_offset";
}

pub const DEFAULT_STATE: &str = "pending";
pub const DEFAULT_PAM: &str = "GG";
pub const DEFAULT_UNIQ_SIZE: u32 = 13;
pub const DEFAULT_FULL_SIZE: u32 = 23;
pub const DEFAULT_BEST_SIZE: u32 = 7;
pub const DEFAULT_BEST_OFFSET: u32 = 13;

/// Encoding knobs for session records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Write absent `asid`/`filename` as the literal `None` instead of an
    /// empty string.
    pub legacy_none_literal: bool,
}

/// What a new session analyses: an existing antiSMASH job or an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOrigin {
    Asid(String),
    File(String),
}

impl SessionOrigin {
    /// Build an origin from an optional id/file pair; exactly one must be set.
    pub fn from_options(from_id: Option<&str>, from_file: Option<&str>) -> Result<Self> {
        match (from_id, from_file) {
            (Some(id), None) => Ok(Self::Asid(id.to_string())),
            (None, Some(file)) => Ok(Self::File(file.to_string())),
            (None, None) => Err(Error::invalid("need either id or file to start a session")),
            (Some(_), Some(_)) => Err(Error::invalid("can't set both id and file for a session")),
        }
    }
}

/// Creates and loads [`Session`] handles against one store.
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
    options: SessionOptions,
}

impl fmt::Debug for Sessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sessions")
            .field("backend", &self.store.backend())
            .field("clock", &self.clock)
            .field("options", &self.options)
            .finish()
    }
}

impl Sessions {
    /// System UTC clock and OS-seeded identifiers.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds::new()),
            options: SessionOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Create a new session record with every field at its default.
    ///
    /// The whole record is written in one multi-field command, with `added`
    /// and `last_changed` both set to now.
    pub async fn create(&self, origin: SessionOrigin) -> Result<Session> {
        let id = SessionId(self.ids.next_id());
        let session = self.handle(id);
        let now = codec::encode_timestamp(self.clock.now());
        let legacy = self.options.legacy_none_literal;

        let (asid, filename) = match &origin {
            SessionOrigin::Asid(asid) => (Some(asid.as_str()), None),
            SessionOrigin::File(file) => (None, Some(file.as_str())),
        };

        let record = [
            (field::STATE, DEFAULT_STATE.to_string()),
            (field::ERROR, String::new()),
            (field::ASID, codec::encode_optional(asid, legacy)),
            (field::FILENAME, codec::encode_optional(filename, legacy)),
            (field::ADDED, now.clone()),
            (field::LAST_CHANGED, now),
            (field::GENOME, codec::encode_document(&json!({}))),
            (field::REGION, codec::encode_document(&json!({}))),
            (field::FROM, codec::encode_int(0)),
            (field::TO, codec::encode_int(0)),
            (field::DERIVED, codec::encode_bool(false)),
            (field::PAM, DEFAULT_PAM.to_string()),
            (field::UNIQ_SIZE, codec::encode_size(DEFAULT_UNIQ_SIZE)),
            (field::FULL_SIZE, codec::encode_size(DEFAULT_FULL_SIZE)),
            (field::BEST_SIZE, codec::encode_size(DEFAULT_BEST_SIZE)),
            (field::BEST_OFFSET, codec::encode_size(DEFAULT_BEST_OFFSET)),
        ];
        self.store.hset_multiple(&session.key, &record).await?;

        debug!(session = %id, origin = ?origin, backend = self.store.backend(), "created session");
        #[cfg(feature = "metrics")]
        metrics::counter!("crispy_sessions_created_total").increment(1);

        Ok(session)
    }

    /// Create from an optional id/file pair. Fails with
    /// [`Error::InvalidArgument`] unless exactly one is given.
    pub async fn create_from(
        &self,
        from_id: Option<&str>,
        from_file: Option<&str>,
    ) -> Result<Session> {
        self.create(SessionOrigin::from_options(from_id, from_file)?)
            .await
    }

    /// Bind to an existing record. Fails with [`Error::NotFound`] if the key
    /// is absent; no field data is read.
    pub async fn load(&self, id: SessionId) -> Result<Session> {
        let session = self.handle(id);
        if !self.store.exists(&session.key).await? {
            return Err(Error::NotFound(id));
        }
        Ok(session)
    }

    /// Load from a store key such as a reference popped off a [`crate::Queue`].
    pub async fn load_key(&self, key: &str) -> Result<Session> {
        self.load(SessionId::from_key(key)?).await
    }

    fn handle(&self, id: SessionId) -> Session {
        Session {
            id,
            key: id.key(),
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            options: self.options,
        }
    }
}

/// Handle to one session record.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    key: String,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("backend", &self.store.backend())
            .finish()
    }
}

type Decoder<T> = fn(&str) -> std::result::Result<T, String>;

fn passthrough(raw: &str) -> std::result::Result<String, String> {
    Ok(raw.to_string())
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Store key of the record, `crispy:session:<id>`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the record is still present in the store.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.store.exists(&self.key).await?)
    }

    // ---- plumbing ----

    async fn raw(&self, name: &'static str) -> Result<String> {
        self.store
            .hget(&self.key, name)
            .await?
            .ok_or_else(|| Error::MissingField {
                key: self.key.clone(),
                field: name,
            })
    }

    fn decode<T>(&self, name: &'static str, raw: &str, decode: Decoder<T>) -> Result<T> {
        decode(raw).map_err(|reason| Error::Decode {
            key: self.key.clone(),
            field: name,
            reason,
        })
    }

    async fn read<T>(&self, name: &'static str, decode: Decoder<T>) -> Result<T> {
        let raw = self.raw(name).await?;
        self.decode(name, &raw, decode)
    }

    /// Set `last_changed` to now. One store write.
    async fn touch(&self) -> Result<()> {
        let now = codec::encode_timestamp(self.clock.now());
        self.store
            .hset(&self.key, field::LAST_CHANGED, &now)
            .await?;
        Ok(())
    }

    /// Two store writes: `last_changed`, then the field itself.
    async fn write(&self, name: &'static str, value: &str) -> Result<()> {
        self.touch().await?;
        self.store.hset(&self.key, name, value).await?;
        Ok(())
    }

    // ---- fields ----

    pub async fn state(&self) -> Result<String> {
        self.read(field::STATE, passthrough).await
    }

    pub async fn set_state(&self, state: &str) -> Result<()> {
        self.write(field::STATE, state).await
    }

    pub async fn error(&self) -> Result<String> {
        self.read(field::ERROR, passthrough).await
    }

    pub async fn set_error(&self, error: &str) -> Result<()> {
        self.write(field::ERROR, error).await
    }

    /// antiSMASH job id, if the session was started from one.
    pub async fn asid(&self) -> Result<Option<String>> {
        let raw = self.store.hget(&self.key, field::ASID).await?;
        Ok(codec::decode_optional(raw))
    }

    pub async fn set_asid(&self, asid: Option<&str>) -> Result<()> {
        let value = codec::encode_optional(asid, self.options.legacy_none_literal);
        self.write(field::ASID, &value).await
    }

    /// Uploaded input file, if the session was started from one.
    pub async fn filename(&self) -> Result<Option<String>> {
        let raw = self.store.hget(&self.key, field::FILENAME).await?;
        Ok(codec::decode_optional(raw))
    }

    pub async fn set_filename(&self, filename: Option<&str>) -> Result<()> {
        let value = codec::encode_optional(filename, self.options.legacy_none_literal);
        self.write(field::FILENAME, &value).await
    }

    /// Creation time as stored. Never changes after creation.
    pub async fn added(&self) -> Result<String> {
        self.read(field::ADDED, passthrough).await
    }

    pub async fn added_datetime(&self) -> Result<DateTime<Utc>> {
        self.read(field::ADDED, codec::decode_timestamp).await
    }

    pub async fn last_changed(&self) -> Result<String> {
        self.read(field::LAST_CHANGED, passthrough).await
    }

    pub async fn last_changed_datetime(&self) -> Result<DateTime<Utc>> {
        self.read(field::LAST_CHANGED, codec::decode_timestamp)
            .await
    }

    pub async fn genome(&self) -> Result<Value> {
        self.read(field::GENOME, codec::decode_document).await
    }

    pub async fn set_genome(&self, genome: &Value) -> Result<()> {
        self.write(field::GENOME, &codec::encode_document(genome))
            .await
    }

    pub async fn region(&self) -> Result<Value> {
        self.read(field::REGION, codec::decode_document).await
    }

    pub async fn set_region(&self, region: &Value) -> Result<()> {
        self.write(field::REGION, &codec::encode_document(region))
            .await
    }

    /// Stored under the `from` field.
    pub async fn from_coord(&self) -> Result<i64> {
        self.read(field::FROM, codec::decode_int).await
    }

    pub async fn set_from_coord(&self, from: i64) -> Result<()> {
        self.write(field::FROM, &codec::encode_int(from)).await
    }

    /// Stored under the `to` field.
    pub async fn to_coord(&self) -> Result<i64> {
        self.read(field::TO, codec::decode_int).await
    }

    pub async fn set_to_coord(&self, to: i64) -> Result<()> {
        self.write(field::TO, &codec::encode_int(to)).await
    }

    pub async fn derived(&self) -> Result<bool> {
        self.read(field::DERIVED, codec::decode_bool).await
    }

    /// Unlike the other setters this does not bump `last_changed`. One store
    /// write.
    pub async fn set_derived(&self, derived: bool) -> Result<()> {
        self.store
            .hset(&self.key, field::DERIVED, &codec::encode_bool(derived))
            .await?;
        Ok(())
    }

    /// Set `derived` from dynamically typed input. Anything but a JSON
    /// boolean fails with [`Error::InvalidArgument`] before touching the store.
    pub async fn set_derived_value(&self, value: &Value) -> Result<()> {
        match value {
            Value::Bool(derived) => self.set_derived(*derived).await,
            other => Err(Error::invalid(format!("{other} is not a boolean value"))),
        }
    }

    pub async fn pam(&self) -> Result<String> {
        self.read(field::PAM, passthrough).await
    }

    pub async fn set_pam(&self, pam: &str) -> Result<()> {
        self.write(field::PAM, pam).await
    }

    pub async fn uniq_size(&self) -> Result<u32> {
        self.read(field::UNIQ_SIZE, codec::decode_size).await
    }

    pub async fn set_uniq_size(&self, size: u32) -> Result<()> {
        self.write(field::UNIQ_SIZE, &codec::encode_size(size))
            .await
    }

    pub async fn full_size(&self) -> Result<u32> {
        self.read(field::FULL_SIZE, codec::decode_size).await
    }

    pub async fn set_full_size(&self, size: u32) -> Result<()> {
        self.write(field::FULL_SIZE, &codec::encode_size(size))
            .await
    }

    pub async fn best_size(&self) -> Result<u32> {
        self.read(field::BEST_SIZE, codec::decode_size).await
    }

    pub async fn set_best_size(&self, size: u32) -> Result<()> {
        self.write(field::BEST_SIZE, &codec::encode_size(size))
            .await
    }

    pub async fn best_offset(&self) -> Result<u32> {
        self.read(field::BEST_OFFSET, codec::decode_size).await
    }

    pub async fn set_best_offset(&self, offset: u32) -> Result<()> {
        self.write(field::BEST_OFFSET, &codec::encode_size(offset))
            .await
    }

    // ---- whole-record access ----

    /// Read the whole record with one `hgetall`.
    pub async fn snapshot(&self) -> Result<SessionRecord> {
        let mut raw = self.store.hgetall(&self.key).await?;
        if raw.is_empty() {
            return Err(Error::NotFound(self.id));
        }
        SessionRecord::decode(self, &mut raw)
    }

    /// Write every field set in `patch` together with `last_changed` in one
    /// atomic multi-field command. An empty patch writes nothing.
    pub async fn apply(&self, patch: &SessionPatch) -> Result<()> {
        let mut fields = patch.encode(self.options.legacy_none_literal);
        if fields.is_empty() {
            return Ok(());
        }
        fields.push((
            field::LAST_CHANGED,
            codec::encode_timestamp(self.clock.now()),
        ));
        self.store.hset_multiple(&self.key, &fields).await?;
        debug!(session = %self.id, fields = fields.len(), "applied session patch");
        Ok(())
    }
}

/// Decoded copy of a whole session record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub state: String,
    pub error: String,
    pub asid: Option<String>,
    pub filename: Option<String>,
    pub added: String,
    pub last_changed: String,
    pub genome: Value,
    pub region: Value,
    pub from_coord: i64,
    pub to_coord: i64,
    pub derived: bool,
    pub pam: String,
    pub uniq_size: u32,
    pub full_size: u32,
    pub best_size: u32,
    pub best_offset: u32,
}

impl SessionRecord {
    fn decode(session: &Session, raw: &mut HashMap<String, String>) -> Result<Self> {
        fn take<T>(
            session: &Session,
            raw: &mut HashMap<String, String>,
            name: &'static str,
            decode: Decoder<T>,
        ) -> Result<T> {
            let value = raw.remove(name).ok_or_else(|| Error::MissingField {
                key: session.key.clone(),
                field: name,
            })?;
            session.decode(name, &value, decode)
        }

        Ok(Self {
            id: session.id,
            state: take(session, raw, field::STATE, passthrough)?,
            error: take(session, raw, field::ERROR, passthrough)?,
            asid: codec::decode_optional(raw.remove(field::ASID)),
            filename: codec::decode_optional(raw.remove(field::FILENAME)),
            added: take(session, raw, field::ADDED, passthrough)?,
            last_changed: take(session, raw, field::LAST_CHANGED, passthrough)?,
            genome: take(session, raw, field::GENOME, codec::decode_document)?,
            region: take(session, raw, field::REGION, codec::decode_document)?,
            from_coord: take(session, raw, field::FROM, codec::decode_int)?,
            to_coord: take(session, raw, field::TO, codec::decode_int)?,
            derived: take(session, raw, field::DERIVED, codec::decode_bool)?,
            pam: take(session, raw, field::PAM, passthrough)?,
            uniq_size: take(session, raw, field::UNIQ_SIZE, codec::decode_size)?,
            full_size: take(session, raw, field::FULL_SIZE, codec::decode_size)?,
            best_size: take(session, raw, field::BEST_SIZE, codec::decode_size)?,
            best_offset: take(session, raw, field::BEST_OFFSET, codec::decode_size)?,
        })
    }
}

/// A set of field updates for [`Session::apply`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub state: Option<String>,
    pub error: Option<String>,
    /// `Some(None)` clears the field.
    pub asid: Option<Option<String>>,
    pub filename: Option<Option<String>>,
    pub genome: Option<Value>,
    pub region: Option<Value>,
    pub from_coord: Option<i64>,
    pub to_coord: Option<i64>,
    pub derived: Option<bool>,
    pub pam: Option<String>,
    pub uniq_size: Option<u32>,
    pub full_size: Option<u32>,
    pub best_size: Option<u32>,
    pub best_offset: Option<u32>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn encode(&self, legacy_none: bool) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(state) = &self.state {
            fields.push((field::STATE, state.clone()));
        }
        if let Some(error) = &self.error {
            fields.push((field::ERROR, error.clone()));
        }
        if let Some(asid) = &self.asid {
            fields.push((
                field::ASID,
                codec::encode_optional(asid.as_deref(), legacy_none),
            ));
        }
        if let Some(filename) = &self.filename {
            fields.push((
                field::FILENAME,
                codec::encode_optional(filename.as_deref(), legacy_none),
            ));
        }
        if let Some(genome) = &self.genome {
            fields.push((field::GENOME, codec::encode_document(genome)));
        }
        if let Some(region) = &self.region {
            fields.push((field::REGION, codec::encode_document(region)));
        }
        if let Some(from) = self.from_coord {
            fields.push((field::FROM, codec::encode_int(from)));
        }
        if let Some(to) = self.to_coord {
            fields.push((field::TO, codec::encode_int(to)));
        }
        if let Some(derived) = self.derived {
            fields.push((field::DERIVED, codec::encode_bool(derived)));
        }
        if let Some(pam) = &self.pam {
            fields.push((field::PAM, pam.clone()));
        }
        for (name, size) in [
            (field::UNIQ_SIZE, self.uniq_size),
            (field::FULL_SIZE, self.full_size),
            (field::BEST_SIZE, self.best_size),
            (field::BEST_OFFSET, self.best_offset),
        ] {
            if let Some(size) = size {
                fields.push((name, codec::encode_size(size)));
            }
        }
        fields
    }
}
