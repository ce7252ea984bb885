//! Per-frame traversal: recording order, swapchain cycling, per-frame pass
//! selection, and failure propagation.

mod framework;

use anyhow::Result;
use deimos::{Format, FrameGraphBuilder, QueueClass, RecordContext, ResourceState};

use framework::{
    config, gbuffer_copy_builder, Event, TestAllocator, TestRecorder, TestSubmit, TestSwapchain,
};

#[test]
fn levels_record_in_dependency_order() -> Result<()> {
    framework::setup();
    let mut builder = gbuffer_copy_builder();
    builder.set_pass_record_fn("gbuffer", |r: &mut TestRecorder, ctx: &RecordContext| {
        r.mark_pass(ctx.pass_name());
        Ok(())
    })?;
    builder.set_pass_record_fn("copy", |r: &mut TestRecorder, ctx: &RecordContext| {
        r.mark_pass(ctx.pass_name());
        Ok(())
    })?;
    let mut graph = builder.build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())?;

    let submit = TestSubmit::new();
    graph.traverse(&submit, 0, 0)?;

    let submissions = submit.submissions.lock().unwrap();
    let (queue, recorders) = submissions.last().unwrap();
    assert_eq!(*queue, QueueClass::Graphics);
    assert_eq!(recorders.len(), 2);
    assert_eq!(recorders[0].level, 0);
    assert_eq!(recorders[1].level, 1);
    drop(submissions);

    let events = submit.last_events();
    let gbuffer_at = events
        .iter()
        .position(|e| matches!(e, Event::Pass(n) if n == "gbuffer"))
        .unwrap();
    let transition_at = events
        .iter()
        .position(|e| {
            matches!(e, Event::Barrier(b) if b.resource == "SceneColor"
                && b.from_state == ResourceState::RenderTarget
                && b.to_state == ResourceState::CopySource)
        })
        .unwrap();
    let copy_at = events
        .iter()
        .position(|e| matches!(e, Event::Pass(n) if n == "copy"))
        .unwrap();
    assert!(gbuffer_at < transition_at);
    assert!(transition_at < copy_at);
    Ok(())
}

#[test]
fn swapchain_cycling_selects_the_matching_pass_copy() -> Result<()> {
    framework::setup();
    let mut builder = gbuffer_copy_builder();
    builder.set_pass_executor("copy", |copy| {
        move |r: &mut TestRecorder, ctx: &RecordContext| {
            r.mark_pass(&format!("copy[{}] dest={:?}", copy, ctx.image("dest")));
            Ok(())
        }
    })?;
    let mut graph = builder.build(config(), &TestSwapchain::new(3), &mut TestAllocator::new())?;

    let submit = TestSubmit::new();
    graph.traverse(&submit, 0, 1)?;
    let events = submit.last_events();
    let expected = format!("copy[1] dest={:?}", Some(TestSwapchain::handle(1)));
    assert!(events.iter().any(|e| matches!(e, Event::Pass(n) if *n == expected)));

    graph.traverse(&submit, 1, 2)?;
    let events = submit.last_events();
    let expected = format!("copy[2] dest={:?}", Some(TestSwapchain::handle(2)));
    assert!(events.iter().any(|e| matches!(e, Event::Pass(n) if *n == expected)));

    // The backbuffer's present handoff references the acquired image.
    let present = events
        .iter()
        .find_map(|e| match e {
            Event::Barrier(b) if b.resource.starts_with("Backbuffer") => Some(b.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(present.image, TestSwapchain::handle(2));
    Ok(())
}

#[test]
fn per_frame_passes_cycle_with_the_frame_index() -> Result<()> {
    framework::setup();
    let mut builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    builder.register_pass("accumulate", QueueClass::Graphics)?;
    builder.register_write_subresource("accumulate", "out")?;
    builder.set_subresource_format("accumulate", "out", Format::Rgba16Float)?;
    builder.set_subresource_state("accumulate", "out", ResourceState::RenderTarget)?;
    builder.bind_subresource_name("accumulate", "out", "History")?;
    builder.mark_resource_per_frame("History");
    builder.set_pass_executor("accumulate", |copy| {
        move |r: &mut TestRecorder, _ctx: &RecordContext| {
            r.mark_pass(&format!("accumulate[{}]", copy));
            Ok(())
        }
    })?;

    let mut graph = builder.build(
        config().frames_in_flight(2),
        &TestSwapchain::new(1),
        &mut TestAllocator::new(),
    )?;

    let submit = TestSubmit::new();
    for (frame, expected) in [(0, "accumulate[0]"), (1, "accumulate[1]"), (2, "accumulate[0]")] {
        graph.traverse(&submit, frame, 0)?;
        let events = submit.last_events();
        assert!(
            events.iter().any(|e| matches!(e, Event::Pass(n) if n == expected)),
            "frame {} did not record {}",
            frame,
            expected
        );
    }
    Ok(())
}

#[test]
fn executor_errors_propagate_out_of_traverse() -> Result<()> {
    framework::setup();
    let mut builder = gbuffer_copy_builder();
    builder.set_pass_record_fn("gbuffer", |_r: &mut TestRecorder, _ctx: &RecordContext| {
        anyhow::bail!("pipeline not loaded yet")
    })?;
    let mut graph = builder.build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())?;

    let submit = TestSubmit::new();
    let error = graph.traverse(&submit, 0, 0).unwrap_err();
    assert!(error.to_string().contains("pipeline not loaded"));
    assert!(submit.submissions.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn submission_failure_propagates() -> Result<()> {
    framework::setup();
    let builder = gbuffer_copy_builder();
    let mut graph = builder.build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())?;

    let mut submit = TestSubmit::new();
    submit.fail_submit = true;
    assert!(graph.traverse(&submit, 0, 0).is_err());
    Ok(())
}

#[test]
fn an_empty_graph_traverses_without_submitting() -> Result<()> {
    framework::setup();
    let builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    let mut graph = builder.build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())?;

    let submit = TestSubmit::new();
    graph.traverse(&submit, 0, 0)?;
    assert!(submit.submissions.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn three_levels_submit_as_one_ordered_batch() -> Result<()> {
    framework::setup();
    let mut builder: FrameGraphBuilder<TestRecorder> = FrameGraphBuilder::new();
    let chain = [("a", "First", "Second"), ("b", "Second", "Third")];
    builder.register_pass("source", QueueClass::Graphics)?;
    builder.register_write_subresource("source", "out")?;
    builder.set_subresource_format("source", "out", Format::Rgba8Unorm)?;
    builder.set_subresource_state("source", "out", ResourceState::RenderTarget)?;
    builder.bind_subresource_name("source", "out", "First")?;
    for (pass, input, output) in chain {
        builder.register_pass(pass, QueueClass::Graphics)?;
        builder.register_read_subresource(pass, "in")?;
        builder.set_subresource_state(pass, "in", ResourceState::ShaderResource)?;
        builder.bind_subresource_name(pass, "in", input)?;
        builder.register_write_subresource(pass, "out")?;
        builder.set_subresource_format(pass, "out", Format::Rgba8Unorm)?;
        builder.set_subresource_state(pass, "out", ResourceState::RenderTarget)?;
        builder.bind_subresource_name(pass, "out", output)?;
    }

    let mut graph = builder.build(config(), &TestSwapchain::new(1), &mut TestAllocator::new())?;
    assert_eq!(graph.dependency_level_count(), 3);

    let submit = TestSubmit::new();
    graph.traverse(&submit, 0, 0)?;
    let submissions = submit.submissions.lock().unwrap();
    let (_, recorders) = submissions.last().unwrap();
    let levels: Vec<u32> = recorders.iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![0, 1, 2]);
    Ok(())
}
