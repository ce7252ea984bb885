#![allow(dead_code)]

use std::sync::Mutex;

use anyhow::Result;

use deimos::{
    BarrierRecord, CommandRecorder, Format, FrameGraphBuilder, FrameGraphConfig, ImageDescription,
    ImageHandle, ImagePoolAllocator, PoolAllocation, PoolHandle, QueueClass, ResourceState,
    SubmitInterface, Swapchain,
};

/// Initialize logging once for a test binary.
pub fn setup() {
    let _ = pretty_env_logger::try_init();
}

/// Fixed-size swapchain handing out predictable image handles.
pub struct TestSwapchain {
    pub images: u32,
    pub format: Format,
}

impl TestSwapchain {
    pub fn new(images: u32) -> Self {
        TestSwapchain {
            images,
            format: Format::Bgra8Unorm,
        }
    }

    pub fn handle(index: u32) -> ImageHandle {
        ImageHandle(0x5C00 + index as u64)
    }
}

impl Swapchain for TestSwapchain {
    fn image_count(&self) -> u32 {
        self.images
    }

    fn image_handle(&self, image_index: u32) -> ImageHandle {
        Self::handle(image_index)
    }

    fn format(&self) -> Format {
        self.format
    }
}

/// Records every batched allocation it is asked for and hands out
/// sequential image handles.
pub struct TestAllocator {
    pub calls: Vec<Vec<ImageDescription>>,
    pub fail: bool,
    next_handle: u64,
}

impl TestAllocator {
    pub fn new() -> Self {
        TestAllocator {
            calls: Vec::new(),
            fail: false,
            next_handle: 1,
        }
    }

    pub fn failing() -> Self {
        TestAllocator {
            fail: true,
            ..Self::new()
        }
    }
}

impl ImagePoolAllocator for TestAllocator {
    fn allocate_image_pool(&mut self, descriptions: &[ImageDescription]) -> Result<PoolAllocation> {
        if self.fail {
            anyhow::bail!("test allocator: out of pool memory");
        }
        self.calls.push(descriptions.to_vec());
        let base = self.next_handle;
        self.next_handle += descriptions.len() as u64;
        Ok(PoolAllocation {
            pool: PoolHandle(self.calls.len() as u64),
            offsets: (0..descriptions.len() as u64).map(|i| i << 16).collect(),
            images: (0..descriptions.len() as u64)
                .map(|i| ImageHandle(base + i))
                .collect(),
        })
    }
}

/// What a test recorder saw, in recording order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Barrier(BarrierRecord),
    Pass(String),
}

/// Command-buffer stand-in collecting an event log.
#[derive(Debug)]
pub struct TestRecorder {
    pub level: u32,
    pub events: Vec<Event>,
}

impl TestRecorder {
    /// Pass executors call this to leave a trace in the log.
    pub fn mark_pass(&mut self, name: &str) {
        self.events.push(Event::Pass(name.to_string()));
    }

    pub fn barriers(&self) -> impl Iterator<Item = &BarrierRecord> {
        self.events.iter().filter_map(|e| match e {
            Event::Barrier(record) => Some(record),
            Event::Pass(_) => None,
        })
    }
}

impl CommandRecorder for TestRecorder {
    fn pipeline_barrier(&mut self, barriers: &[BarrierRecord]) {
        for record in barriers {
            self.events.push(Event::Barrier(record.clone()));
        }
    }
}

/// Captures every submission with its recorders.
pub struct TestSubmit {
    pub submissions: Mutex<Vec<(QueueClass, Vec<TestRecorder>)>>,
    pub fail_submit: bool,
}

impl TestSubmit {
    pub fn new() -> Self {
        TestSubmit {
            submissions: Mutex::new(Vec::new()),
            fail_submit: false,
        }
    }

    /// The event streams of the last submission, flattened in level order.
    pub fn last_events(&self) -> Vec<Event> {
        let submissions = self.submissions.lock().unwrap();
        let (_, recorders) = submissions.last().expect("no submission captured");
        recorders.iter().flat_map(|r| r.events.clone()).collect()
    }
}

impl SubmitInterface<TestRecorder> for TestSubmit {
    fn create_recorder(&self, level: u32, _frame_slot: u32) -> Result<TestRecorder> {
        Ok(TestRecorder {
            level,
            events: Vec::new(),
        })
    }

    fn submit(&self, queue: QueueClass, recorders: Vec<TestRecorder>) -> Result<()> {
        if self.fail_submit {
            anyhow::bail!("test submit: queue failure");
        }
        self.submissions.lock().unwrap().push((queue, recorders));
        Ok(())
    }
}

/// Standard two-pass graph used all over the tests: a gbuffer pass renders
/// into "SceneColor", a copy pass reads it and writes the backbuffer.
pub fn gbuffer_copy_builder() -> FrameGraphBuilder<TestRecorder> {
    let mut builder = FrameGraphBuilder::new();

    builder.register_pass("gbuffer", QueueClass::Graphics).unwrap();
    builder.register_write_subresource("gbuffer", "color").unwrap();
    builder
        .set_subresource_format("gbuffer", "color", Format::Rgba8Unorm)
        .unwrap();
    builder
        .set_subresource_state("gbuffer", "color", ResourceState::RenderTarget)
        .unwrap();
    builder
        .bind_subresource_name("gbuffer", "color", "SceneColor")
        .unwrap();

    builder.register_pass("copy", QueueClass::Graphics).unwrap();
    builder.register_read_subresource("copy", "source").unwrap();
    builder
        .set_subresource_state("copy", "source", ResourceState::CopySource)
        .unwrap();
    builder
        .bind_subresource_name("copy", "source", "SceneColor")
        .unwrap();
    builder.register_write_subresource("copy", "dest").unwrap();
    builder
        .set_subresource_state("copy", "dest", ResourceState::CopyDest)
        .unwrap();
    builder
        .bind_subresource_name("copy", "dest", "Backbuffer")
        .unwrap();
    builder.bind_backbuffer_name("Backbuffer");

    builder
}

pub fn config() -> FrameGraphConfig {
    FrameGraphConfig::new(1280, 720)
}
