use std::sync::Arc;
use std::{env, fs};

use scenemap::{AssetMap, Boundary, MapConfig, MapResult};
use scenemap_file_adapter::FileGateway;

/// Runs a test with setup and guaranteed teardown.
/// Teardown runs whether the test body passes, errors, or panics.
pub fn run_test<B, T, A>(before: B, test: T, after: A)
where
    B: Fn() -> MapResult<TestContext>,
    T: Fn(TestContext) -> MapResult<()>,
    A: Fn(TestContext),
{
    let ctx = before().expect("before run failed");

    let result = {
        let ctx = ctx.clone();
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || test(ctx)))
    };

    after(ctx);

    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => panic!("test failed: {err:?}"),
        Err(panic_err) => std::panic::resume_unwind(panic_err),
    }
}

#[derive(Clone)]
pub struct TestContext {
    path: String,
    map: AssetMap,
}

impl TestContext {
    pub fn new(path: String, map: AssetMap) -> Self {
        Self { path, map }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn map(&self) -> AssetMap {
        self.map.clone()
    }

    /// A fresh gateway on the same document, for reopening the map or
    /// racing a second writer against it.
    pub fn reopen_gateway(&self) -> Arc<FileGateway> {
        Arc::new(FileGateway::new(&self.path))
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    let temp_dir = env::temp_dir();
    temp_dir
        .join(format!("scenemap-{id}.json"))
        .to_str()
        .unwrap()
        .to_string()
}

/// World boundary used throughout the integration tests.
pub fn test_world() -> Boundary {
    Boundary::new(-100.0, -100.0, -100.0, 100.0, 100.0, 100.0)
}

pub fn test_config() -> MapConfig {
    MapConfig::new().with_world_boundary(test_world())
}

/// Creates a file-backed map on a fresh random path.
pub fn create_map_context() -> MapResult<TestContext> {
    let path = random_path();
    let gateway = Arc::new(FileGateway::new(&path));
    let map = AssetMap::open_or_create(test_config(), gateway)?;
    Ok(TestContext::new(path, map))
}

pub fn cleanup(ctx: TestContext) {
    let _ = fs::remove_file(ctx.path());
}
