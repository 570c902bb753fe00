//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::io::Read;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use crate::context::WorkingContext;
use crate::session::{
    AttributeNameValue, COMPLETED_STATUS, CloudShellApi, ConnectorInfo, GlobalInput,
    ReservationDetails, ReservationSummary, ResourceAttributesUpdate, ResourceInfo,
    ResourceRequest, SessionError, SetConnectorRequest,
};
use crate::toolchain::{CommandOutput, CommandRunner, ToolchainError};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Working directory the command ran in.
    pub cwd: Utf8PathBuf,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes a response with no exit code to simulate abnormal termination.
    pub fn push_missing_exit_code(&self) {
        self.push_output(None, "", "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: &Utf8Path,
    ) -> Result<CommandOutput, ToolchainError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ToolchainError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Minimal shell definition used by workspace presets.
pub const SHELL_DEFINITION: &str = "\
tosca_definitions_version: tosca_simple_yaml_1_0
metadata:
  template_name: Traffic Controller
  template_version: 1.0.0
  main_class: driver.TrafficControllerDriver
node_types:
  vendor.Controller:
    derived_from: cloudshell.nodes.TrafficGeneratorController
    artifacts:
      driver:
        file: TrafficControllerDriver.zip
        type: tosca.artifacts.File
";

/// Minimal package manifest used by workspace presets.
pub const SHELL_MANIFEST: &str = "\
TOSCA-Meta-File-Version: 1.0
CSAR-Version: 0.1.1
Created-By: Anonymous
Entry-Definitions: placeholder.yaml
";

/// Minimal driver descriptor used by workspace presets.
pub const DRIVER_DESCRIPTOR: &str = "\
<Driver Description=\"Traffic controller\" MainClass=\"old.Old\" Name=\"Old\" Version=\"1.0.0\">
    <Layout>
        <Category Name=\"Load Configuration\"/>
    </Layout>
</Driver>
";

/// Temporary directory laid out like a shell or script project.
///
/// Helpers panic on I/O failure; they are only meant for tests.
#[derive(Debug)]
pub struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

#[expect(
    clippy::expect_used,
    reason = "fixture setup aborts the test on filesystem failure"
)]
impl Workspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("temp dir path should be UTF-8");
        Self { _dir: dir, root }
    }

    /// Creates a shell project: definition, manifest, and driver descriptor.
    #[must_use]
    pub fn shell() -> Self {
        let workspace = Self::new();
        workspace.write("shell-definition.yaml", SHELL_DEFINITION);
        workspace.write("TOSCA-Metadata/TOSCA.meta", SHELL_MANIFEST);
        workspace.write("src/drivermetadata.xml", DRIVER_DESCRIPTOR);
        workspace.write("src/driver.py", "class TrafficControllerDriver:\n    pass\n");
        workspace
    }

    /// Creates a script project with a definition naming `script_name` and
    /// the given source files.
    #[must_use]
    pub fn script(script_name: &str, sources: &[(&str, &str)]) -> Self {
        let workspace = Self::new();
        workspace.write(
            "script-definition.yaml",
            &format!("metadata:\n  script_name: {script_name}\n"),
        );
        for (path, contents) in sources {
            workspace.write(&format!("src/{path}"), contents);
        }
        workspace
    }

    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of `relative` inside the workspace.
    #[must_use]
    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// Working context rooted at the workspace.
    #[must_use]
    pub fn ctx(&self) -> WorkingContext {
        WorkingContext::new(self.root.clone())
    }

    /// Writes `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent directories");
        }
        std::fs::write(&path, contents).expect("write workspace file");
    }

    /// Reads `relative` as a string.
    #[must_use]
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).expect("read workspace file")
    }

    /// Creates the directory `relative`.
    pub fn mkdir(&self, relative: &str) {
        std::fs::create_dir_all(self.path(relative)).expect("create directory");
    }

    /// Removes the file `relative`.
    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.path(relative)).expect("remove workspace file");
    }

    /// Returns whether `relative` exists.
    #[must_use]
    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the entry names stored in the zip archive at `path`.
///
/// # Panics
///
/// Panics when the archive cannot be opened.
#[must_use]
#[expect(
    clippy::expect_used,
    reason = "assertion helper aborts the test on unreadable archives"
)]
pub fn archive_entries(path: &Utf8Path) -> BTreeSet<String> {
    let file = std::fs::File::open(path).expect("open archive");
    let archive = zip::ZipArchive::new(file).expect("read archive");
    archive.file_names().map(str::to_owned).collect()
}

/// Returns the content of entry `name` in the zip archive at `path`.
///
/// # Panics
///
/// Panics when the archive or entry cannot be read.
#[must_use]
#[expect(
    clippy::expect_used,
    reason = "assertion helper aborts the test on unreadable archives"
)]
pub fn archive_entry(path: &Utf8Path, name: &str) -> String {
    let file = std::fs::File::open(path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("read archive");
    let mut entry = archive.by_name(name).expect("archive entry");
    let mut contents = String::new();
    entry.read_to_string(&mut contents).expect("read entry");
    contents
}

#[derive(Debug, Default)]
struct FakeState {
    reservations: Vec<ReservationSummary>,
    details: BTreeMap<String, ReservationDetails>,
    pending_polls: BTreeMap<String, usize>,
    resources: Vec<ResourceInfo>,
    drivers: BTreeMap<String, String>,
    attribute_updates: Vec<ResourceAttributesUpdate>,
    scripts: Vec<(String, Vec<u8>)>,
    calls: Vec<String>,
    failures: BTreeMap<String, SessionError>,
    polls_before_completion: usize,
    hide_services: bool,
    next_id: usize,
}

/// In-memory [`CloudShellApi`] that records every call.
///
/// Reservations end after a configurable number of detail polls; failures
/// can be injected per method name.
#[derive(Clone, Debug)]
pub struct FakeCloudShell {
    username: String,
    state: Rc<RefCell<FakeState>>,
}

impl Default for FakeCloudShell {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCloudShell {
    /// Creates a fake logged on as `admin`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            username: String::from("admin"),
            state: Rc::default(),
        }
    }

    /// Seeds a running reservation and returns its identifier.
    #[must_use]
    pub fn seed_reservation(&self, name: &str) -> String {
        let mut state = self.state.borrow_mut();
        let summary = state.allocate(name, &self.username);
        summary.id
    }

    /// Seeds an existing resource.
    pub fn seed_resource(&self, name: &str, model: &str) {
        self.state.borrow_mut().resources.push(ResourceInfo {
            name: name.to_owned(),
            model: model.to_owned(),
            address: String::from("na"),
            folder: String::new(),
        });
    }

    /// Makes every later call to `method` fail with `error`.
    pub fn fail_on(&self, method: &str, error: SessionError) {
        self.state
            .borrow_mut()
            .failures
            .insert(method.to_owned(), error);
    }

    /// Number of detail polls an ending reservation reports before it
    /// completes.
    pub fn complete_after_polls(&self, polls: usize) {
        self.state.borrow_mut().polls_before_completion = polls;
    }

    /// Stops added services from showing up in reservation details.
    pub fn hide_services(&self) {
        self.state.borrow_mut().hide_services = true;
    }

    /// Calls recorded so far, formatted as `Method arg`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Reservations currently known to the fake.
    #[must_use]
    pub fn reservations(&self) -> Vec<ReservationSummary> {
        self.state.borrow().reservations.clone()
    }

    /// Resources currently known to the fake.
    #[must_use]
    pub fn resources(&self) -> Vec<ResourceInfo> {
        self.state.borrow().resources.clone()
    }

    /// Driver assigned to resource `name`, if any.
    #[must_use]
    pub fn driver_of(&self, name: &str) -> Option<String> {
        self.state.borrow().drivers.get(name).cloned()
    }

    /// Attribute updates received so far.
    #[must_use]
    pub fn attribute_updates(&self) -> Vec<ResourceAttributesUpdate> {
        self.state.borrow().attribute_updates.clone()
    }

    /// Scripts uploaded so far with their archive bytes.
    #[must_use]
    pub fn uploaded_scripts(&self) -> Vec<(String, Vec<u8>)> {
        self.state.borrow().scripts.clone()
    }

    /// Reservation details as the fake currently sees them.
    #[must_use]
    pub fn details(&self, reservation_id: &str) -> Option<ReservationDetails> {
        self.state.borrow().details.get(reservation_id).cloned()
    }

    fn enter(&self, method: &str, argument: &str) -> Result<(), SessionError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("{method} {argument}").trim_end().to_owned());
        state
            .failures
            .get(method)
            .map_or(Ok(()), |error| Err(error.clone()))
    }
}

fn not_found(method: &str, reservation_id: &str) -> SessionError {
    SessionError::Api {
        method: method.to_owned(),
        code: String::from("100"),
        message: format!("reservation {reservation_id} not found"),
    }
}

impl FakeState {
    fn allocate(&mut self, name: &str, owner: &str) -> ReservationSummary {
        self.next_id += 1;
        let summary = ReservationSummary {
            id: format!("r-{}", self.next_id),
            name: name.to_owned(),
            owner: owner.to_owned(),
            status: String::from("Started"),
        };
        self.reservations.push(summary.clone());
        self.details.insert(
            summary.id.clone(),
            ReservationDetails {
                id: summary.id.clone(),
                name: name.to_owned(),
                status: summary.status.clone(),
                ..ReservationDetails::default()
            },
        );
        summary
    }

    fn details_mut(
        &mut self,
        method: &str,
        reservation_id: &str,
    ) -> Result<&mut ReservationDetails, SessionError> {
        self.details
            .get_mut(reservation_id)
            .ok_or_else(|| not_found(method, reservation_id))
    }

    fn set_status(&mut self, reservation_id: &str, status: &str) {
        if let Some(details) = self.details.get_mut(reservation_id) {
            status.clone_into(&mut details.status);
        }
        for reservation in &mut self.reservations {
            if reservation.id == reservation_id {
                status.clone_into(&mut reservation.status);
            }
        }
    }
}

impl CloudShellApi for FakeCloudShell {
    fn host(&self) -> &str {
        "localhost"
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> &str {
        "admin"
    }

    fn domain(&self) -> &str {
        "Global"
    }

    fn token(&self) -> &str {
        "fake-token"
    }

    fn get_current_reservations(
        &self,
        owner: &str,
    ) -> Result<Vec<ReservationSummary>, SessionError> {
        self.enter("GetCurrentReservations", owner)?;
        Ok(self
            .state
            .borrow()
            .reservations
            .iter()
            .filter(|reservation| reservation.owner == owner)
            .cloned()
            .collect())
    }

    fn create_immediate_reservation(
        &self,
        name: &str,
        owner: &str,
        _duration_minutes: u32,
    ) -> Result<ReservationSummary, SessionError> {
        self.enter("CreateImmediateReservation", name)?;
        Ok(self.state.borrow_mut().allocate(name, owner))
    }

    fn create_immediate_topology_reservation(
        &self,
        name: &str,
        owner: &str,
        topology: &str,
        _global_inputs: &[GlobalInput],
        _duration_minutes: u32,
    ) -> Result<ReservationSummary, SessionError> {
        self.enter("CreateImmediateTopologyReservation", topology)?;
        Ok(self.state.borrow_mut().allocate(name, owner))
    }

    fn end_reservation(&self, reservation_id: &str) -> Result<(), SessionError> {
        self.enter("EndReservation", reservation_id)?;
        let mut state = self.state.borrow_mut();
        state.details_mut("EndReservation", reservation_id)?;
        let polls = state.polls_before_completion;
        if polls == 0 {
            state.set_status(reservation_id, COMPLETED_STATUS);
        } else {
            state.set_status(reservation_id, "Ending");
            state.pending_polls.insert(reservation_id.to_owned(), polls);
        }
        Ok(())
    }

    fn get_reservation_details(
        &self,
        reservation_id: &str,
    ) -> Result<ReservationDetails, SessionError> {
        self.enter("GetReservationDetails", reservation_id)?;
        let mut state = self.state.borrow_mut();
        let remaining = state.pending_polls.get(reservation_id).copied();
        match remaining {
            Some(0 | 1) => {
                state.pending_polls.remove(reservation_id);
                state.set_status(reservation_id, COMPLETED_STATUS);
            }
            Some(polls) => {
                state
                    .pending_polls
                    .insert(reservation_id.to_owned(), polls - 1);
            }
            None => {}
        }
        let hide_services = state.hide_services;
        let details = state.details_mut("GetReservationDetails", reservation_id)?;
        let mut snapshot = details.clone();
        if hide_services {
            snapshot.services.clear();
        }
        Ok(snapshot)
    }

    fn delete_reservation(&self, reservation_id: &str) -> Result<(), SessionError> {
        self.enter("DeleteReservation", reservation_id)?;
        let mut state = self.state.borrow_mut();
        state.details.remove(reservation_id);
        state
            .reservations
            .retain(|reservation| reservation.id != reservation_id);
        Ok(())
    }

    fn get_resource_list(&self) -> Result<Vec<ResourceInfo>, SessionError> {
        self.enter("GetResourceList", "")?;
        Ok(self.state.borrow().resources.clone())
    }

    fn create_resource(&self, request: &ResourceRequest) -> Result<ResourceInfo, SessionError> {
        self.enter("CreateResource", &request.name)?;
        let resource = ResourceInfo {
            name: request.name.clone(),
            model: request.model.clone(),
            address: request.address.clone(),
            folder: request.folder.clone(),
        };
        self.state.borrow_mut().resources.push(resource.clone());
        Ok(resource)
    }

    fn delete_resource(&self, name: &str) -> Result<(), SessionError> {
        self.enter("DeleteResource", name)?;
        self.state
            .borrow_mut()
            .resources
            .retain(|resource| resource.name != name);
        Ok(())
    }

    fn update_resource_driver(&self, name: &str, driver: &str) -> Result<(), SessionError> {
        self.enter("UpdateResourceDriver", name)?;
        self.state
            .borrow_mut()
            .drivers
            .insert(name.to_owned(), driver.to_owned());
        Ok(())
    }

    fn set_attributes_values(
        &self,
        updates: &[ResourceAttributesUpdate],
    ) -> Result<(), SessionError> {
        self.enter("SetAttributesValues", "")?;
        self.state
            .borrow_mut()
            .attribute_updates
            .extend_from_slice(updates);
        Ok(())
    }

    fn add_service_to_reservation(
        &self,
        reservation_id: &str,
        _model: &str,
        alias: &str,
        _attributes: &[AttributeNameValue],
    ) -> Result<(), SessionError> {
        self.enter("AddServiceToReservation", alias)?;
        let mut state = self.state.borrow_mut();
        let details = state.details_mut("AddServiceToReservation", reservation_id)?;
        details.services.push(alias.to_owned());
        Ok(())
    }

    fn set_connectors_in_reservation(
        &self,
        reservation_id: &str,
        connectors: &[SetConnectorRequest],
    ) -> Result<(), SessionError> {
        self.enter("SetConnectorsInReservation", reservation_id)?;
        let mut state = self.state.borrow_mut();
        let details = state.details_mut("SetConnectorsInReservation", reservation_id)?;
        details
            .connectors
            .extend(connectors.iter().map(|connector| ConnectorInfo {
                source: connector.source.clone(),
                target: connector.target.clone(),
                alias: connector.alias.clone(),
            }));
        Ok(())
    }

    fn update_script(&self, name: &str, archive: &Utf8Path) -> Result<(), SessionError> {
        self.enter("UpdateScript", name)?;
        let bytes = std::fs::read(archive).map_err(|err| SessionError::Io {
            path: archive.to_string(),
            message: err.to_string(),
        })?;
        self.state
            .borrow_mut()
            .scripts
            .push((name.to_owned(), bytes));
        Ok(())
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    #[must_use]
    pub fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
