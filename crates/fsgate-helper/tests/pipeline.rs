//! End-to-end helper invocations with injected process, identity and transport seams.

use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use fsgate_helper::{
    CallerIdentity, CallerVerifier, CatalogReader, DescriptorSource, Executor, HelperOutcome,
    HelperResult, IdentityControl, PrivilegeAcquirer, ProcessInspector, Rendition,
    StandardArchiveCodec, TransportFile, run,
};
use fsgate_ops::{
    BytePayload, ExecutionResult, HelperExit, ItemFailures, OperationDescriptor, encode,
    parse_report,
};
use fsgate_test_support::fixtures::{temp_dir, write_files};
use nix::errno::Errno;

const FRONTEND: &str = "/usr/libexec/fsgate/fsgate-frontend";

struct Inspector(&'static str);

impl ProcessInspector for Inspector {
    fn inspect(&self) -> io::Result<CallerIdentity> {
        Ok(CallerIdentity {
            pid: 4242,
            parent_pid: 4241,
            parent_executable: Some(PathBuf::from(self.0)),
        })
    }
}

struct Identity {
    uid_after: u32,
    calls: Cell<usize>,
}

impl Identity {
    const fn root() -> Self {
        Self {
            uid_after: 0,
            calls: Cell::new(0),
        }
    }
}

impl IdentityControl for &Identity {
    fn set_user(&self, _uid: u32) -> Result<(), Errno> {
        self.calls.set(self.calls.get() + 1);
        Ok(())
    }

    fn set_group(&self, _gid: u32) -> Result<(), Errno> {
        self.calls.set(self.calls.get() + 1);
        Ok(())
    }

    fn real_user(&self) -> u32 {
        self.uid_after
    }

    fn effective_user(&self) -> u32 {
        self.uid_after
    }
}

struct MemorySource {
    descriptor: Vec<u8>,
    stdin: Vec<u8>,
    reads: Cell<usize>,
    location: PathBuf,
}

impl MemorySource {
    fn new(descriptor: &OperationDescriptor) -> Result<Self> {
        Ok(Self::raw(encode(descriptor)?))
    }

    fn raw(descriptor: Vec<u8>) -> Self {
        Self {
            descriptor,
            stdin: Vec::new(),
            reads: Cell::new(0),
            location: PathBuf::from("/run/fsgate/test.json"),
        }
    }
}

impl DescriptorSource for MemorySource {
    fn read_descriptor(&self) -> HelperResult<Vec<u8>> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.descriptor.clone())
    }

    fn read_stdin(&self) -> io::Result<Vec<u8>> {
        Ok(self.stdin.clone())
    }

    fn location(&self) -> &Path {
        &self.location
    }
}

fn invoke(source: &impl DescriptorSource, identity: &Identity) -> HelperOutcome {
    run(
        &CallerVerifier::new(Inspector(FRONTEND), FRONTEND),
        PrivilegeAcquirer::new(identity),
        source,
        &Executor::standard(),
    )
}

#[test]
fn unauthorized_caller_has_no_observable_effect() -> Result<()> {
    let temp = temp_dir()?;
    let victim = temp.path().join("victim.txt");
    fs::write(&victim, b"precious")?;
    let source = MemorySource::new(&OperationDescriptor::Delete {
        source_paths: vec![victim.clone()],
    })?;
    let identity = Identity::root();

    let outcome = run(
        &CallerVerifier::new(Inspector("/usr/bin/python3"), FRONTEND),
        PrivilegeAcquirer::new(&identity),
        &source,
        &Executor::standard(),
    );

    assert_eq!(outcome.exit, HelperExit::UnauthorizedCaller);
    assert_ne!(outcome.exit.code(), 0);
    assert_eq!(identity.calls.get(), 0);
    assert_eq!(source.reads.get(), 0);
    assert_eq!(fs::read(&victim)?, b"precious");
    assert!(
        outcome
            .diagnostics()
            .iter()
            .any(|line| line.starts_with("error: unauthorized caller"))
    );
    Ok(())
}

#[test]
fn unconfirmed_privilege_stops_before_reading_transport() -> Result<()> {
    let temp = temp_dir()?;
    let victim = temp.path().join("victim.txt");
    fs::write(&victim, b"precious")?;
    let source = MemorySource::new(&OperationDescriptor::Delete {
        source_paths: vec![victim.clone()],
    })?;
    let identity = Identity {
        uid_after: 501,
        calls: Cell::new(0),
    };

    let outcome = invoke(&source, &identity);

    assert_eq!(outcome.exit, HelperExit::PrivilegeAcquisitionFailed);
    assert_eq!(source.reads.get(), 0);
    assert!(victim.exists());
    Ok(())
}

#[test]
fn undecodable_transport_aborts_with_decode_status() -> Result<()> {
    let source = MemorySource::raw(br#"{"kind":"move","source_paths":["/tmp/a"]}"#.to_vec());
    let outcome = invoke(&source, &Identity::root());

    assert_eq!(outcome.exit, HelperExit::DecodeFailed);
    assert_eq!(
        outcome.result,
        ExecutionResult::fatal(
            "descriptor of kind `move` is missing required field `destination_path`"
        )
    );
    Ok(())
}

#[test]
fn copy_reports_missing_source_and_copies_the_rest() -> Result<()> {
    let temp = temp_dir()?;
    write_files(temp.path(), &[("a.txt", b"original bytes")])?;
    let out = temp.path().join("out");
    fs::create_dir(&out)?;
    let source = MemorySource::new(&OperationDescriptor::Copy {
        source_paths: vec![temp.path().join("a.txt"), temp.path().join("missing.txt")],
        destination_path: out.clone(),
    })?;

    let outcome = invoke(&source, &Identity::root());

    let mut expected = ItemFailures::new();
    expected.insert("missing.txt".to_string(), "not found".to_string());
    assert_eq!(
        outcome.result,
        ExecutionResult::PartialFailure { failures: expected }
    );
    assert_eq!(outcome.exit, HelperExit::PartialFailure);
    assert_eq!(fs::read(out.join("a.txt"))?, b"original bytes");
    assert_eq!(fs::read(temp.path().join("a.txt"))?, b"original bytes");
    assert_eq!(
        parse_report(&outcome.diagnostics().join("\n")),
        Some(outcome.result.clone())
    );
    Ok(())
}

#[test]
fn streamed_bytes_are_written_after_resolution() -> Result<()> {
    let temp = temp_dir()?;
    let target = temp.path().join("blob.bin");
    let mut source = MemorySource::new(&OperationDescriptor::WriteBytes {
        source_path: target.clone(),
        payload: BytePayload::Stdin,
    })?;
    source.stdin = vec![0, 1, 2, 255];

    let outcome = invoke(&source, &Identity::root());

    assert_eq!(outcome.exit, HelperExit::Success);
    assert_eq!(fs::read(&target)?, vec![0, 1, 2, 255]);
    Ok(())
}

#[test]
fn transport_file_feeds_a_listing() -> Result<()> {
    let temp = temp_dir()?;
    write_files(temp.path(), &[("dir/b.txt", b""), ("dir/a.txt", b"")])?;
    let transport = temp.path().join("op.json");
    fs::write(
        &transport,
        encode(&OperationDescriptor::ListDirectory {
            source_path: temp.path().join("dir"),
        })?,
    )?;

    let outcome = invoke(&TransportFile::new(&transport), &Identity::root());

    assert_eq!(
        outcome.result.entries(),
        Some(
            [temp.path().join("dir/a.txt"), temp.path().join("dir/b.txt")].as_slice()
        )
    );
    Ok(())
}

struct ThreeRenditions;

impl CatalogReader for ThreeRenditions {
    fn renditions(&self, _catalog: &Path) -> HelperResult<Vec<Rendition>> {
        Ok(vec![
            Rendition::new("AppIcon.png", b"icon".to_vec()),
            Rendition::new("Launch.png", b"launch".to_vec()),
            Rendition::new("Tab.png", b"tab".to_vec()),
        ])
    }
}

#[test]
fn extract_catalog_writes_two_of_three_renditions() -> Result<()> {
    let temp = temp_dir()?;
    let destination = temp.path().join("extracted");
    fs::create_dir_all(destination.join("Launch.png"))?;
    let source = MemorySource::new(&OperationDescriptor::ExtractCatalog {
        source_path: temp.path().join("Assets.car"),
        destination_path: destination.clone(),
    })?;
    let identity = Identity::root();

    let outcome = run(
        &CallerVerifier::new(Inspector(FRONTEND), FRONTEND),
        PrivilegeAcquirer::new(&identity),
        &source,
        &Executor::with_capabilities(StandardArchiveCodec, ThreeRenditions),
    );

    match &outcome.result {
        ExecutionResult::PartialFailure { failures } => {
            assert_eq!(failures.keys().collect::<Vec<_>>(), vec!["Launch.png"]);
        }
        other => anyhow::bail!("expected partial failure, got {other:?}"),
    }
    assert_eq!(fs::read(destination.join("AppIcon.png"))?, b"icon");
    assert_eq!(fs::read(destination.join("Tab.png"))?, b"tab");
    assert_eq!(outcome.exit, HelperExit::PartialFailure);
    Ok(())
}
