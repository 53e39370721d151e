// src/test_support.rs
//
// In-memory collaborators and a log capture used across the unit tests.

use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;

use crate::{
    catalog::DomainProvider,
    models::{
        AcDcValue, PowerCfgSetting, PowerPlan, PowerSnapshot, RawValue, RawValues,
        RegistrySetting, RegistryValueType, SettingAppliedEvent, SettingDefinition,
    },
    system::{
        EventPublisher, HardwareProbe, ImportFlag, OsVersionProbe, PowerQuery, ProcessControl,
        RawValueDiscovery, RegistryIo, ServiceControl, SystemServices,
    },
};

/// Collects everything logged on the current thread while the guard lives.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().lines().filter(|l| l.contains(needle)).count()
    }

    /// Lines at `level` ("WARN", "INFO", ...) containing every needle.
    pub fn lines_at(&self, level: &str, needles: &[&str]) -> usize {
        self.contents()
            .lines()
            .filter(|l| l.contains(level) && needles.iter().all(|n| l.contains(n)))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FakeOs {
    pub windows11: bool,
    pub server: bool,
    pub build: u32,
}

impl FakeOs {
    pub fn windows10(build: u32) -> Self {
        Self {
            windows11: false,
            server: false,
            build,
        }
    }

    pub fn windows11(build: u32) -> Self {
        Self {
            windows11: true,
            server: false,
            build,
        }
    }

    pub fn server(build: u32) -> Self {
        Self {
            windows11: build >= 22000,
            server: true,
            build,
        }
    }
}

impl OsVersionProbe for FakeOs {
    fn is_windows11(&self) -> bool {
        self.windows11
    }

    fn is_windows_server(&self) -> bool {
        self.server
    }

    fn build_number(&self) -> u32 {
        self.build
    }
}

#[derive(Debug, Default)]
pub struct FakeHardware {
    pub battery: bool,
    pub lid: bool,
    pub brightness: bool,
    pub hybrid_sleep: bool,
    pub calls: AtomicUsize,
}

impl FakeHardware {
    pub fn desktop() -> Self {
        Self {
            hybrid_sleep: true,
            ..Default::default()
        }
    }

    pub fn laptop() -> Self {
        Self {
            battery: true,
            lid: true,
            brightness: true,
            hybrid_sleep: false,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HardwareProbe for FakeHardware {
    async fn has_battery(&self) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.battery)
    }

    async fn has_lid(&self) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lid)
    }

    async fn supports_brightness_control(&self) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.brightness)
    }

    async fn supports_hybrid_sleep(&self) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hybrid_sleep)
    }
}

#[derive(Default)]
pub struct FakePower {
    plans: Mutex<Vec<PowerPlan>>,
    snapshot: Mutex<PowerSnapshot>,
    hardware_controlled: Mutex<HashSet<String>>,
    pub fail_snapshot: AtomicBool,
    pub fail_plans: AtomicBool,
    pub snapshot_calls: AtomicUsize,
    pub plan_calls: AtomicUsize,
    pub invalidations: AtomicUsize,
    pub activated: Mutex<Vec<String>>,
    pub written: Mutex<Vec<(String, u32, u32)>>,
}

impl FakePower {
    pub fn set_plans(&self, plans: Vec<PowerPlan>) {
        *self.plans.lock() = plans;
    }

    pub fn insert_setting(&self, guid: &str, ac: u32, dc: u32) {
        self.snapshot
            .lock()
            .insert(guid.to_ascii_lowercase(), AcDcValue { ac, dc });
    }

    pub fn mark_hardware_controlled(&self, guid: &str) {
        self.hardware_controlled
            .lock()
            .insert(guid.to_ascii_lowercase());
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PowerQuery for FakePower {
    async fn get_available_power_plans(&self) -> anyhow::Result<Vec<PowerPlan>> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_plans.load(Ordering::SeqCst) {
            anyhow::bail!("power plan enumeration failed");
        }
        Ok(self.plans.lock().clone())
    }

    async fn get_active_power_plan(&self) -> anyhow::Result<Option<PowerPlan>> {
        Ok(self.plans.lock().iter().find(|p| p.is_active).cloned())
    }

    async fn get_all_power_settings_ac_dc(&self, _scheme_id: &str) -> anyhow::Result<PowerSnapshot> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_snapshot.load(Ordering::SeqCst) {
            anyhow::bail!("powercfg query failed");
        }
        Ok(self.snapshot.lock().clone())
    }

    async fn is_setting_hardware_controlled(&self, setting: &PowerCfgSetting) -> anyhow::Result<bool> {
        Ok(self
            .hardware_controlled
            .lock()
            .contains(&setting.snapshot_key()))
    }

    async fn set_active_power_plan(&self, guid: &str) -> anyhow::Result<()> {
        self.activated.lock().push(guid.to_string());
        Ok(())
    }

    async fn set_power_setting_value(
        &self,
        setting: &PowerCfgSetting,
        ac: u32,
        dc: u32,
    ) -> anyhow::Result<()> {
        self.written
            .lock()
            .push((setting.setting_guid.clone(), ac, dc));
        Ok(())
    }

    fn invalidate_cache(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

type WriteHook = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Registry keyed by `(key_path, value_name)`.
#[derive(Default)]
pub struct FakeRegistry {
    values: Mutex<HashMap<(String, String), RawValue>>,
    pub writes: Mutex<Vec<(String, String, Option<RawValue>)>>,
    pub deleted_keys: Mutex<Vec<String>>,
    failing_paths: Mutex<HashSet<String>>,
    on_write: Mutex<Option<WriteHook>>,
}

impl FakeRegistry {
    pub fn put(&self, key_path: &str, value_name: &str, value: RawValue) {
        self.values
            .lock()
            .insert((key_path.to_string(), value_name.to_string()), value);
    }

    pub fn get(&self, key_path: &str, value_name: &str) -> Option<RawValue> {
        self.values
            .lock()
            .get(&(key_path.to_string(), value_name.to_string()))
            .cloned()
    }

    pub fn fail_writes_to(&self, key_path: &str) {
        self.failing_paths.lock().insert(key_path.to_string());
    }

    pub fn on_write(&self, hook: impl Fn(&str, &str) + Send + Sync + 'static) {
        *self.on_write.lock() = Some(Box::new(hook));
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    fn record(&self, key_path: &str, value_name: &str, value: Option<RawValue>) -> anyhow::Result<()> {
        if self.failing_paths.lock().contains(key_path) {
            anyhow::bail!("Access denied writing '{}\\{}'", key_path, value_name);
        }
        let key = (key_path.to_string(), value_name.to_string());
        match &value {
            Some(v) => {
                self.values.lock().insert(key, v.clone());
            }
            None => {
                self.values.lock().remove(&key);
            }
        }
        self.writes
            .lock()
            .push((key_path.to_string(), value_name.to_string(), value));
        if let Some(hook) = self.on_write.lock().as_ref() {
            hook(key_path, value_name);
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryIo for FakeRegistry {
    async fn apply_setting(
        &self,
        setting: &RegistrySetting,
        enable: bool,
        value: Option<&RawValue>,
    ) -> anyhow::Result<bool> {
        let target = value.or_else(|| setting.value_for(enable)).cloned();
        self.record(&setting.key_path, &setting.value_name, target)?;
        Ok(true)
    }

    async fn get_value(&self, key_path: &str, value_name: &str) -> anyhow::Result<Option<RawValue>> {
        Ok(self.get(key_path, value_name))
    }

    async fn set_value(
        &self,
        key_path: &str,
        value_name: &str,
        value: &RawValue,
        _value_type: RegistryValueType,
    ) -> anyhow::Result<()> {
        self.record(key_path, value_name, Some(value.clone()))
    }

    async fn delete_value(&self, key_path: &str, value_name: &str) -> anyhow::Result<()> {
        self.record(key_path, value_name, None)
    }

    async fn key_exists(&self, key_path: &str) -> anyhow::Result<bool> {
        Ok(self.values.lock().keys().any(|(path, _)| path == key_path))
    }

    async fn delete_key(&self, key_path: &str) -> anyhow::Result<()> {
        self.values.lock().retain(|(path, _), _| path != key_path);
        self.deleted_keys.lock().push(key_path.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProcesses {
    pub killed: Mutex<Vec<String>>,
    pub running: AtomicBool,
}

#[async_trait]
impl ProcessControl for FakeProcesses {
    async fn kill_process(&self, name: &str) -> anyhow::Result<()> {
        self.killed.lock().push(name.to_string());
        Ok(())
    }

    async fn is_process_running(&self, _name: &str) -> anyhow::Result<bool> {
        Ok(self.running.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct FakeServices {
    pub restarted: Mutex<Vec<String>>,
}

#[async_trait]
impl ServiceControl for FakeServices {
    async fn restart_service(&self, name: &str) -> anyhow::Result<()> {
        self.restarted.lock().push(name.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDiscovery {
    values: Mutex<HashMap<String, RawValues>>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeDiscovery {
    pub fn set(&self, setting_id: &str, values: RawValues) {
        self.values.lock().insert(setting_id.to_string(), values);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RawValueDiscovery for FakeDiscovery {
    async fn get_raw_settings_values(
        &self,
        settings: &[SettingDefinition],
    ) -> anyhow::Result<HashMap<String, RawValues>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("discovery failed");
        }
        let values = self.values.lock();
        Ok(settings
            .iter()
            .filter_map(|s| values.get(&s.id).map(|v| (s.id.clone(), v.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Mutex<Vec<SettingAppliedEvent>>,
}

impl EventPublisher for RecordingEvents {
    fn publish(&self, event: SettingAppliedEvent) {
        self.events.lock().push(event);
    }
}

/// Domain provider that hands out a fixed catalog, or fails.
pub struct StaticProvider {
    name: String,
    settings: Option<Vec<SettingDefinition>>,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(name: &str, settings: Vec<SettingDefinition>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            settings: Some(settings),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            settings: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DomainProvider for StaticProvider {
    fn domain_name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> anyhow::Result<Vec<SettingDefinition>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.settings
            .clone()
            .ok_or_else(|| anyhow::anyhow!("catalog for '{}' could not be built", self.name))
    }
}

/// One of every fake, with typed handles kept for assertions.
pub struct TestSystem {
    pub os: Arc<FakeOs>,
    pub hardware: Arc<FakeHardware>,
    pub power: Arc<FakePower>,
    pub registry: Arc<FakeRegistry>,
    pub processes: Arc<FakeProcesses>,
    pub services: Arc<FakeServices>,
    pub discovery: Arc<FakeDiscovery>,
    pub events: Arc<RecordingEvents>,
    pub import_state: Arc<ImportFlag>,
}

impl TestSystem {
    pub fn new(os: FakeOs, hardware: FakeHardware) -> Self {
        Self {
            os: Arc::new(os),
            hardware: Arc::new(hardware),
            power: Arc::new(FakePower::default()),
            registry: Arc::new(FakeRegistry::default()),
            processes: Arc::new(FakeProcesses::default()),
            services: Arc::new(FakeServices::default()),
            discovery: Arc::new(FakeDiscovery::default()),
            events: Arc::new(RecordingEvents::default()),
            import_state: Arc::new(ImportFlag::new()),
        }
    }

    pub fn services(&self) -> SystemServices {
        SystemServices {
            os: self.os.clone(),
            hardware: self.hardware.clone(),
            power: self.power.clone(),
            registry: self.registry.clone(),
            processes: self.processes.clone(),
            services: self.services.clone(),
            discovery: self.discovery.clone(),
            events: self.events.clone(),
            import_state: self.import_state.clone(),
        }
    }
}
