//! In-memory doubles for the pipeline's collaborators. Test builds only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::contracts::analyzer::AnalysisEngine;
use crate::contracts::cache::{
    generation_key, item_key, list_key, tombstone_key, ContractCache,
};
use crate::contracts::detector::KeywordTypeDetector;
use crate::contracts::files::FileStore;
use crate::contracts::store::{ensure_owner, not_found, ContractRepository};
use crate::errors::AppError;
use crate::models::contract::{
    Assessment, ContractAnalysis, ContractType, NewAnalysis, Risk, Severity,
};
use crate::models::user::SessionUser;
use crate::state::AppState;

#[derive(Default)]
pub struct MemoryContractStore {
    records: Mutex<Vec<ContractAnalysis>>,
    fail_creates: bool,
}

impl MemoryContractStore {
    /// Every `create` fails, as if the insert lost a race on the id.
    pub fn failing_creates() -> Self {
        Self {
            fail_creates: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ContractRepository for MemoryContractStore {
    async fn create(&self, analysis: &ContractAnalysis) -> Result<(), AppError> {
        if self.fail_creates {
            return Err(AppError::DuplicateId(analysis.id.to_string()));
        }
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.id == analysis.id) {
            return Err(AppError::DuplicateId(analysis.id.to_string()));
        }
        records.push(analysis.clone());
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ContractAnalysis>, AppError> {
        let records = self.records.lock().unwrap();
        let limit = limit.map_or(usize::MAX, |n| n.max(0) as usize);
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.owner_id == owner_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_by_id(
        &self,
        id: Uuid,
        requesting_owner: Uuid,
    ) -> Result<ContractAnalysis, AppError> {
        let records = self.records.lock().unwrap();
        let found = records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))?;
        ensure_owner(&found, requesting_owner)?;
        Ok(found)
    }

    async fn delete(&self, id: Uuid, requesting_owner: Uuid) -> Result<ContractAnalysis, AppError> {
        let mut records = self.records.lock().unwrap();
        let idx = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| not_found(id))?;
        ensure_owner(&records[idx], requesting_owner)?;
        Ok(records.remove(idx))
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_deletes: bool,
}

impl MemoryFileStore {
    /// Every `delete` fails, as if object storage were unreachable.
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        if self.fail_deletes {
            return Err(AppError::Storage(format!("delete of {key} refused")));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Mirrors the Redis cache layout. `unavailable` simulates an outage.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    unavailable: bool,
}

impl MemoryCache {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Whether a list is cached under the owner's current generation.
    pub fn has_current_list(&self, owner_id: Uuid) -> bool {
        let entries = self.entries.lock().unwrap();
        let generation = current_generation(&entries, owner_id);
        entries.contains_key(&list_key(owner_id, generation))
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable {
            return Err(AppError::Internal(anyhow::anyhow!("cache unavailable")));
        }
        Ok(())
    }

    fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        self.check()?;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .map(|raw| serde_json::from_str(raw).unwrap()))
    }

    fn put<T: serde::Serialize + ?Sized>(&self, key: String, value: &T) -> Result<(), AppError> {
        self.check()?;
        let raw = serde_json::to_string(value).unwrap();
        self.entries.lock().unwrap().insert(key, raw);
        Ok(())
    }
}

fn current_generation(entries: &HashMap<String, String>, owner_id: Uuid) -> u64 {
    entries
        .get(&generation_key(owner_id))
        .map(|raw| raw.parse().unwrap())
        .unwrap_or(0)
}

#[async_trait]
impl ContractCache for MemoryCache {
    async fn list_generation(&self, owner_id: Uuid) -> Result<u64, AppError> {
        self.check()?;
        Ok(current_generation(&self.entries.lock().unwrap(), owner_id))
    }

    async fn get_list(
        &self,
        owner_id: Uuid,
        generation: u64,
    ) -> Result<Option<Vec<ContractAnalysis>>, AppError> {
        self.get(&list_key(owner_id, generation))
    }

    async fn put_list(
        &self,
        owner_id: Uuid,
        generation: u64,
        contracts: &[ContractAnalysis],
    ) -> Result<(), AppError> {
        self.put(list_key(owner_id, generation), contracts)
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<ContractAnalysis>, AppError> {
        if self.contains(&tombstone_key(id)) {
            return Ok(None);
        }
        self.get(&item_key(id))
    }

    async fn put_item(&self, contract: &ContractAnalysis) -> Result<(), AppError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(&tombstone_key(contract.id)) {
            let raw = serde_json::to_string(contract).unwrap();
            entries.insert(item_key(contract.id), raw);
        }
        Ok(())
    }

    async fn invalidate(&self, owner_id: Uuid, deleted: Option<Uuid>) -> Result<(), AppError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let next = current_generation(&entries, owner_id) + 1;
        entries.insert(generation_key(owner_id), next.to_string());
        if let Some(id) = deleted {
            entries.insert(tombstone_key(id), "1".to_string());
            entries.remove(&item_key(id));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionUser>>,
}

impl MemorySessionStore {
    /// Registers a fresh user under `token` and returns it.
    pub fn login(&self, token: &str) -> SessionUser {
        let user = SessionUser {
            id: Uuid::new_v4(),
            email: format!("{token}@example.com"),
            display_name: format!("User {token}"),
            profile_picture: None,
            is_premium: true,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(token.to_string(), user.clone());
        user
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, token: &str) -> Result<Option<SessionUser>, AppError> {
        Ok(self.sessions.lock().unwrap().get(token).cloned())
    }

    async fn revoke(&self, token: &str) -> Result<(), AppError> {
        self.sessions.lock().unwrap().remove(token);
        Ok(())
    }
}

enum StubOutcome {
    Assess(Assessment),
    Fail,
}

/// Analysis engine with a scripted answer.
pub struct StubEngine {
    outcome: StubOutcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_type: Mutex<Option<ContractType>>,
}

impl StubEngine {
    pub fn returning(assessment: Assessment) -> Self {
        Self {
            outcome: StubOutcome::Assess(assessment),
            delay: None,
            calls: AtomicUsize::new(0),
            last_type: Mutex::new(None),
        }
    }

    pub fn with_severities(severities: &[Severity]) -> Self {
        Self::returning(assessment_with(severities))
    }

    pub fn failing() -> Self {
        Self {
            outcome: StubOutcome::Fail,
            ..Self::with_severities(&[])
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_severities(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_type(&self) -> Option<ContractType> {
        *self.last_type.lock().unwrap()
    }
}

#[async_trait]
impl AnalysisEngine for StubEngine {
    async fn assess(
        &self,
        _text: &str,
        contract_type: ContractType,
    ) -> Result<Assessment, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_type.lock().unwrap() = Some(contract_type);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outcome {
            StubOutcome::Assess(assessment) => Ok(assessment.clone()),
            StubOutcome::Fail => Err(AppError::AnalysisService("engine offline".to_string())),
        }
    }
}

pub fn assessment_with(severities: &[Severity]) -> Assessment {
    Assessment {
        summary: "Test summary.".to_string(),
        risks: severities
            .iter()
            .enumerate()
            .map(|(i, severity)| Risk {
                clause_reference: format!("Section {}", i + 1),
                severity: *severity,
                description: format!("Risk {}", i + 1),
            })
            .collect(),
        recommendations: vec!["Negotiate the flagged clauses.".to_string()],
    }
}

pub fn analysis_with(owner_id: Uuid, severities: &[Severity]) -> ContractAnalysis {
    let id = Uuid::new_v4();
    ContractAnalysis::new(NewAnalysis {
        id,
        owner_id,
        contract_type: ContractType::Services,
        assessment: assessment_with(severities),
        file_name: "services.pdf".to_string(),
        storage_key: format!("contracts/{owner_id}/{id}.pdf"),
    })
}

pub struct TestHarness {
    pub state: AppState,
    pub contracts: Arc<MemoryContractStore>,
    pub files: Arc<MemoryFileStore>,
    pub cache: Arc<MemoryCache>,
    pub sessions: Arc<MemorySessionStore>,
    pub engine: Arc<StubEngine>,
}

impl TestHarness {
    pub fn new(engine: StubEngine) -> Self {
        Self::with_parts(engine, MemoryContractStore::default(), MemoryCache::default())
    }

    pub fn with_parts(engine: StubEngine, contracts: MemoryContractStore, cache: MemoryCache) -> Self {
        let config = Config::for_tests();
        let contracts = Arc::new(contracts);
        let files = Arc::new(MemoryFileStore::default());
        let cache = Arc::new(cache);
        let sessions = Arc::new(MemorySessionStore::default());
        let engine = Arc::new(engine);

        let state = AppState {
            contracts: contracts.clone(),
            files: files.clone(),
            cache: cache.clone(),
            sessions: sessions.clone(),
            detector: Arc::new(KeywordTypeDetector::new(config.detection_threshold)),
            engine: engine.clone(),
            config,
        };

        Self {
            state,
            contracts,
            files,
            cache,
            sessions,
            engine,
        }
    }
}

pub const EMPLOYMENT_PAGES: &[&[&str]] = &[
    &[
        "EMPLOYMENT AGREEMENT",
        "This Employment Agreement is made between Acme Corp, the Employer,",
        "and Jane Doe, the Employee.",
        "1. Job Title. The Employee is hired as Senior Engineer.",
        "2. Salary. The Employer shall pay an annual salary of 120000 dollars.",
        "3. Probationary Period. The first 90 days are a probationary period.",
    ],
    &[
        "4. Working Hours. Working hours are 9am to 5pm, Monday to Friday.",
        "5. Benefits. The Employee is entitled to paid time off and benefits.",
        "6. Termination of Employment. Either party may end this agreement",
        "with 30 days written notice.",
    ],
];

/// Builds a small but well-formed PDF with one text line per entry.
pub fn sample_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let page_count = pages.len();
    let page_ids: Vec<usize> = (0..page_count).map(|i| 4 + 2 * i).collect();
    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    for (page_id, lines) in page_ids.iter().zip(pages) {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_id + 1
        ));
        let mut stream = String::from("BT\n/F1 12 Tf\n72 720 Td\n");
        for line in lines.iter() {
            let escaped = line
                .replace('\\', "\\\\")
                .replace('(', "\\(")
                .replace(')', "\\)");
            stream.push_str(&format!("({escaped}) Tj\n0 -16 Td\n"));
        }
        stream.push_str("ET");
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}
