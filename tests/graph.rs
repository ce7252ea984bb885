//! Dependency resolution and subresource chain structure.

mod framework;

use anyhow::Result;
use deimos::{Error, Format, FrameGraphBuilder, QueueClass, ResourceState};

use framework::{config, gbuffer_copy_builder, TestAllocator, TestRecorder, TestSwapchain};

#[test]
fn write_read_dependency_orders_passes_into_levels() -> Result<()> {
    framework::setup();
    let builder = gbuffer_copy_builder();
    let graph = builder.build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())?;

    assert_eq!(graph.dependency_level_count(), 2);
    assert_eq!(graph.dependency_level("gbuffer"), Some(0));
    assert_eq!(graph.dependency_level("copy"), Some(1));
    Ok(())
}

#[test]
fn readers_without_a_writer_share_a_level() -> Result<()> {
    framework::setup();
    let mut builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    for pass in ["a", "b"] {
        builder.register_pass(pass, QueueClass::Graphics)?;
        builder.register_read_subresource(pass, "tex")?;
        builder.set_subresource_format(pass, "tex", Format::Rgba8Unorm)?;
        builder.set_subresource_state(pass, "tex", ResourceState::ShaderResource)?;
        builder.bind_subresource_name(pass, "tex", "SharedTex")?;
    }
    let graph = builder.build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())?;

    assert_eq!(graph.dependency_level_count(), 1);
    assert_eq!(graph.dependency_level("a"), Some(0));
    assert_eq!(graph.dependency_level("b"), Some(0));
    assert!(graph.barrier_records().is_empty());
    Ok(())
}

#[test]
fn subresource_chains_are_circular_and_complete() -> Result<()> {
    framework::setup();
    let builder = gbuffer_copy_builder();
    let graph = builder.build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())?;

    // One registration per pass touching the resource.
    assert_eq!(graph.chain_length("SceneColor"), Some(2));
    assert_eq!(
        graph.chain_passes("SceneColor"),
        Some(vec!["gbuffer".to_string(), "copy".to_string()])
    );
    // Copy's write plus the synthetic acquire/present pass.
    assert_eq!(graph.chain_length("Backbuffer"), Some(2));
    Ok(())
}

#[test]
fn swapchain_amplification_extends_chains_per_image() -> Result<()> {
    framework::setup();
    let builder = gbuffer_copy_builder();
    let graph = builder.build(config(), &TestSwapchain::new(3), &mut TestAllocator::new())?;

    // The copy pass cycles with the swapchain; the single gbuffer recording
    // appears once per phase of the extended chain.
    assert_eq!(graph.chain_length("SceneColor"), Some(6));
    for instance in ["Backbuffer#0", "Backbuffer#1", "Backbuffer#2"] {
        assert_eq!(graph.chain_length(instance), Some(2));
    }
    let names: Vec<&str> = graph.pass_names().collect();
    assert!(names.contains(&"copy#0"));
    assert!(names.contains(&"copy#2"));
    assert!(names.contains(&"gbuffer"));
    Ok(())
}

#[test]
fn cyclic_graphs_fail_fast() -> Result<()> {
    framework::setup();
    let mut builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    builder.register_pass("a", QueueClass::Graphics)?;
    builder.register_read_subresource("a", "in")?;
    builder.bind_subresource_name("a", "in", "X")?;
    builder.register_write_subresource("a", "out")?;
    builder.bind_subresource_name("a", "out", "Y")?;

    builder.register_pass("b", QueueClass::Graphics)?;
    builder.register_read_subresource("b", "in")?;
    builder.bind_subresource_name("b", "in", "Y")?;
    builder.register_write_subresource("b", "out")?;
    builder.bind_subresource_name("b", "out", "X")?;

    let error = builder
        .build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())
        .unwrap_err();
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::GraphHasCycle)));
    Ok(())
}

#[test]
fn unbound_subresources_fail_before_allocation() -> Result<()> {
    framework::setup();
    let mut builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    builder.register_pass("a", QueueClass::Graphics)?;
    builder.register_write_subresource("a", "out")?;

    let mut allocator = TestAllocator::new();
    let error = builder
        .build(config(), &TestSwapchain::new(1), &mut allocator)
        .unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::UnboundSubresource(pass, role)) if pass == "a" && role == "out"
    ));
    assert!(allocator.calls.is_empty());
    Ok(())
}

#[test]
fn registration_errors_are_reported() -> Result<()> {
    framework::setup();
    let mut builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    builder.register_pass("a", QueueClass::Graphics)?;

    let error = builder.register_pass("a", QueueClass::Compute).unwrap_err();
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::DuplicatePass(_))));

    let error = builder
        .set_subresource_format("missing", "out", Format::Rgba8Unorm)
        .unwrap_err();
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::PassNotFound(_))));

    let error = builder
        .set_subresource_state("a", "missing", ResourceState::Common)
        .unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::SubresourceNotFound(_, _))
    ));

    builder.register_write_subresource("a", "out")?;
    let error = builder.register_write_subresource("a", "out").unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::DuplicateSubresource(_, _))
    ));
    Ok(())
}

#[test]
fn mixed_frame_periods_in_one_pass_are_rejected() -> Result<()> {
    framework::setup();
    let mut builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    builder.register_pass("bad", QueueClass::Graphics)?;
    builder.register_write_subresource("bad", "dest")?;
    builder.set_subresource_state("bad", "dest", ResourceState::CopyDest)?;
    builder.bind_subresource_name("bad", "dest", "Backbuffer")?;
    builder.register_write_subresource("bad", "history")?;
    builder.set_subresource_format("bad", "history", Format::Rgba16Float)?;
    builder.set_subresource_state("bad", "history", ResourceState::RenderTarget)?;
    builder.bind_subresource_name("bad", "history", "History")?;
    builder.bind_backbuffer_name("Backbuffer");
    builder.mark_resource_per_frame("History");

    let error = builder
        .build(config(), &TestSwapchain::new(3), &mut TestAllocator::new())
        .unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::MixedFramePeriods(pass)) if pass == "bad"
    ));
    Ok(())
}

#[test]
fn unused_backbuffer_binding_is_rejected() -> Result<()> {
    framework::setup();
    let mut builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    builder.register_pass("a", QueueClass::Graphics)?;
    builder.register_write_subresource("a", "out")?;
    builder.set_subresource_format("a", "out", Format::Rgba8Unorm)?;
    builder.set_subresource_state("a", "out", ResourceState::RenderTarget)?;
    builder.bind_subresource_name("a", "out", "Color")?;
    builder.bind_backbuffer_name("Nope");

    let error = builder
        .build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())
        .unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::BackbufferNotUsed(name)) if name == "Nope"
    ));
    Ok(())
}

#[test]
fn rebuilding_the_same_description_is_deterministic() -> Result<()> {
    framework::setup();
    let first = gbuffer_copy_builder().build(config(), &TestSwapchain::new(2), &mut TestAllocator::new())?;
    let second = gbuffer_copy_builder().build(config(), &TestSwapchain::new(2), &mut TestAllocator::new())?;

    let first_passes: Vec<&str> = first.pass_names().collect();
    let second_passes: Vec<&str> = second.pass_names().collect();
    assert_eq!(first_passes, second_passes);
    assert_eq!(first.dependency_level_count(), second.dependency_level_count());
    assert_eq!(first.barrier_records(), second.barrier_records());
    Ok(())
}
