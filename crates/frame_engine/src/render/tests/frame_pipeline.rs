//! End-to-end frame tests against the recording mock

use ash::vk::{self, Handle};

use super::mock_gpu::{GpuCall, MockArena, MockDevice, MockFactory, MockGpu, Resource};
use crate::config::RendererConfig;
use crate::render::commands::{FrameInputs, RenderCommand};
use crate::render::error::{PresentOutcome, VulkanError};
use crate::render::frame_sync::{FrameOutcome, FrameSynchronizer};
use crate::render::renderer::Renderer;
use crate::render::swapchain_lifecycle::{LifecycleState, RebuildStatus, SwapchainLifecycle};
use crate::render::vertex::{Mesh, Vertex};

const EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };
const RESIZED: vk::Extent2D = vk::Extent2D { width: 1024, height: 768 };
const MINIMIZED: vk::Extent2D = vk::Extent2D { width: 0, height: 0 };

type MockRenderer = Renderer<MockDevice, MockFactory, MockArena>;

fn renderer(gpu: &MockGpu, capacity: usize) -> MockRenderer {
    let config = RendererConfig::default().with_vertex_capacity(capacity);
    Renderer::new(gpu.device(), gpu.factory(), MockArena::new(capacity), &config, EXTENT).unwrap()
}

fn add_triangle(x: f32, y: f32, w: f32, h: f32) -> Mesh {
    Mesh::new(vec![
        Vertex::new([x, y], [1.0, 0.0, 0.0]),
        Vertex::new([x + w / 2.0, y + h], [0.0, 1.0, 0.0]),
        Vertex::new([x + w, y], [0.0, 0.0, 1.0]),
    ])
}

fn two_triangles() -> Vec<Mesh> {
    vec![
        add_triangle(100.0, 100.0, 200.0, 150.0),
        add_triangle(400.0, 300.0, 150.0, 100.0),
    ]
}

fn presented_slot(outcome: FrameOutcome) -> usize {
    match outcome {
        FrameOutcome::Presented { slot, .. } => slot,
        other => panic!("expected a presented frame, got {:?}", other),
    }
}

/// Slots cycle 0, 1, 0, 1 and each slot fence is waited once before each reuse
#[test]
fn test_frame_slots_cycle() {
    let gpu = MockGpu::new(2);
    let mut renderer = renderer(&gpu, 1000);
    let fences: Vec<vk::Fence> = (0..2).map(|i| renderer.frames().slot(i).unwrap().in_flight).collect();
    gpu.state_mut().clear_calls();
    // The upload gate waits on both fences, so the first two ticks need no wait
    renderer.update_vertex_buffer(&two_triangles()).unwrap();

    let mut slots = Vec::new();
    for _ in 0..6 {
        assert_eq!(renderer.current_frame(), slots.len() % 2);
        slots.push(presented_slot(renderer.draw_frame(EXTENT).unwrap()));
    }
    assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);

    let state = gpu.state();
    for fence in &fences {
        let waits = state.count(|call| matches!(call, GpuCall::WaitForFences(f) if f == &vec![*fence]));
        let resets = state.count(|call| call == &GpuCall::ResetFence(*fence));
        assert_eq!(waits, 2);
        assert_eq!(resets, 3);
    }

    // Every reset of a slot fence is preceded by a wait on it since its previous reset
    for fence in &fences {
        let mut waited = false;
        for call in state.calls() {
            match call {
                GpuCall::WaitForFences(f) if f.contains(fence) => waited = true,
                GpuCall::ResetFence(f) if f == fence => {
                    assert!(waited, "fence reset without a prior wait");
                    waited = false;
                }
                _ => {}
            }
        }
    }
}

/// With more images than slots, reusing an image waits on the fence that last drew into it
#[test]
fn test_image_owned_by_other_slot_is_waited() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    let slot0 = renderer.frames().slot(0).unwrap().in_flight;

    // Ticks use (slot, image): (0,0) (1,1) (0,2) then (1,0), owned by slot 0
    for _ in 0..3 {
        renderer.draw_frame(EXTENT).unwrap();
    }
    gpu.state_mut().clear_calls();

    let outcome = renderer.draw_frame(EXTENT).unwrap();
    assert!(matches!(outcome, FrameOutcome::Presented { slot: 1, image_index: 0, .. }));

    let state = gpu.state();
    let slot1 = renderer.frames().slot(1).unwrap().in_flight;
    let waits: Vec<&GpuCall> = state
        .calls()
        .iter()
        .filter(|call| matches!(call, GpuCall::WaitForFences(_)))
        .collect();
    assert_eq!(
        waits,
        vec![&GpuCall::WaitForFences(vec![slot1]), &GpuCall::WaitForFences(vec![slot0])]
    );
}

/// A stalled GPU stops the CPU after N frames instead of overrunning
#[test]
fn test_throttle_bounds_cpu_lead() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    gpu.state_mut().gpu_stalled = true;

    renderer.draw_frame(EXTENT).unwrap();
    renderer.draw_frame(EXTENT).unwrap();
    assert_eq!(renderer.draw_frame(EXTENT), Err(VulkanError::Timeout));
    assert_eq!(gpu.state().submits(), 2);
}

/// Stale acquire on tick 5 submits nothing; tick 6 draws exactly once
#[test]
fn test_stale_acquire_aborts_tick() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    renderer.update_vertex_buffer(&two_triangles()).unwrap();
    gpu.state_mut().stale_acquires.insert(5);

    for _ in 0..4 {
        renderer.draw_frame(EXTENT).unwrap();
    }
    let frame_before = renderer.current_frame();
    gpu.state_mut().clear_calls();

    let tick5 = renderer.draw_frame(EXTENT).unwrap();
    assert_eq!(
        tick5,
        FrameOutcome::Aborted {
            rebuild: RebuildStatus::Rebuilt { generation: 1, image_count: 3 }
        }
    );
    assert_eq!(gpu.state().submits(), 0);
    assert_eq!(gpu.state().presents(), 0);
    assert_eq!(gpu.state().count(|c| matches!(c, GpuCall::Record { .. })), 0);
    assert_eq!(renderer.current_frame(), frame_before);
    gpu.state_mut().clear_calls();

    let tick6 = renderer.draw_frame(EXTENT).unwrap();
    assert!(matches!(tick6, FrameOutcome::Presented { rebuild: None, .. }));
    assert_eq!(renderer.lifecycle().state(), LifecycleState::Live);
    assert_eq!(renderer.lifecycle().epoch().unwrap().generation, 1);
    assert_eq!(gpu.state().submits(), 1);
    assert_eq!(gpu.state().presents(), 1);
    assert_eq!(gpu.state().draw_counts(), vec![6]);
}

/// Two triangles draw 6 vertices before and after a resize rebuild
#[test]
fn test_resize_keeps_vertex_count() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    assert_eq!(renderer.update_vertex_buffer(&two_triangles()).unwrap(), 6);

    renderer.draw_frame(EXTENT).unwrap();
    assert_eq!(gpu.state().draw_counts(), vec![6]);
    let old_generation = renderer.lifecycle().epoch().unwrap().generation;

    renderer.notify_resized();
    assert_eq!(renderer.draw_frame(MINIMIZED).unwrap(), FrameOutcome::Deferred);
    gpu.state_mut().clear_calls();

    let outcome = renderer.draw_frame(RESIZED).unwrap();
    assert!(matches!(
        outcome,
        FrameOutcome::Presented { rebuild: Some(RebuildStatus::Rebuilt { .. }), .. }
    ));

    let epoch = renderer.lifecycle().epoch().unwrap();
    assert!(epoch.generation > old_generation);
    assert_eq!(epoch.extent, RESIZED);

    let state = gpu.state();
    assert_eq!(state.draw_counts(), vec![6]);
    let commands = state.last_recorded().unwrap();
    assert!(matches!(
        commands[0],
        RenderCommand::BeginRenderPass { extent, framebuffer, .. }
            if extent == RESIZED && epoch.framebuffers.contains(&framebuffer)
    ));
}

/// The resize flag alone triggers a rebuild right after the next present
#[test]
fn test_resize_flag_rebuilds_after_present() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    renderer.notify_resized();
    gpu.state_mut().clear_calls();

    let outcome = renderer.draw_frame(RESIZED).unwrap();
    assert!(matches!(
        outcome,
        FrameOutcome::Presented { rebuild: Some(RebuildStatus::Rebuilt { generation: 1, .. }), .. }
    ));
    assert!(!renderer.frames().is_resize_pending());

    let state = gpu.state();
    let present_at = state.calls().iter().position(|c| matches!(c, GpuCall::Present { .. })).unwrap();
    let idle_at = state.calls().iter().position(|c| c == &GpuCall::WaitIdle).unwrap();
    assert!(present_at < idle_at, "rebuild must follow present");
}

#[test]
fn test_present_out_of_date_rebuilds() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    gpu.state_mut().present_script.push_back(Ok(PresentOutcome::OutOfDate));

    let outcome = renderer.draw_frame(EXTENT).unwrap();
    assert!(matches!(outcome, FrameOutcome::Presented { rebuild: Some(_), .. }));
    assert_eq!(renderer.lifecycle().epoch().unwrap().generation, 1);
    // The frame still advanced
    assert_eq!(renderer.current_frame(), 1);
}

#[test]
fn test_suboptimal_acquire_rebuilds_after_present() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    gpu.state_mut().suboptimal_acquires.insert(1);

    let outcome = renderer.draw_frame(EXTENT).unwrap();
    assert!(matches!(outcome, FrameOutcome::Presented { rebuild: Some(_), .. }));
    assert_eq!(gpu.state().presents(), 1);
}

#[test]
fn test_device_lost_is_fatal() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    gpu.state_mut().present_script.push_back(Err(VulkanError::DeviceLost));

    assert_eq!(renderer.draw_frame(EXTENT), Err(VulkanError::DeviceLost));
}

/// Idle rebuilds leave draw count and projection identical
#[test]
fn test_rebuild_is_idempotent() {
    let gpu = MockGpu::new(3);
    let device = gpu.device();
    let mut factory = gpu.factory();
    let mut lifecycle = SwapchainLifecycle::new(&device, &mut factory, EXTENT).unwrap();
    let mut frames = FrameSynchronizer::new(&device, 2).unwrap();
    let inputs = FrameInputs {
        vertex_buffer: vk::Buffer::from_raw(0xB0),
        vertex_count: 6,
        descriptor_set: vk::DescriptorSet::null(),
        clear_color: [0.0, 0.0, 0.0, 1.0],
    };

    frames.tick(&device, &mut factory, &mut lifecycle, EXTENT, &inputs).unwrap();
    let before = frame_state(gpu.state().last_recorded().unwrap());

    lifecycle.rebuild(&device, &mut factory, EXTENT).unwrap();
    lifecycle.rebuild(&device, &mut factory, EXTENT).unwrap();
    assert_eq!(gpu.state().live(Resource::Swapchain), 1);

    frames.tick(&device, &mut factory, &mut lifecycle, EXTENT, &inputs).unwrap();
    let after = frame_state(gpu.state().last_recorded().unwrap());
    assert_eq!(before, after);

    lifecycle.destroy(&device, &mut factory).unwrap();
    frames.destroy(&device);
}

fn frame_state(commands: &[RenderCommand]) -> Vec<RenderCommand> {
    commands
        .iter()
        .filter(|c| matches!(c, RenderCommand::Draw { .. } | RenderCommand::PushConstants { .. }))
        .map(|c| match *c {
            RenderCommand::PushConstants { projection, stages, .. } => RenderCommand::PushConstants {
                layout: vk::PipelineLayout::null(),
                stages,
                projection,
            },
            other => other,
        })
        .collect()
}

/// Minimized ticks do nothing; restoring the window rebuilds and draws
#[test]
fn test_zero_area_tick_defers() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    let epoch_before = renderer.lifecycle().epoch().unwrap().clone();
    gpu.state_mut().clear_calls();

    assert_eq!(renderer.draw_frame(MINIMIZED).unwrap(), FrameOutcome::Deferred);
    assert_eq!(renderer.draw_frame(vk::Extent2D { width: 640, height: 0 }).unwrap(), FrameOutcome::Deferred);
    assert!(gpu.state().calls().is_empty());
    assert_eq!(renderer.lifecycle().epoch().unwrap(), &epoch_before);
    assert!(renderer.lifecycle().is_rebuild_pending());

    let outcome = renderer.draw_frame(EXTENT).unwrap();
    assert!(matches!(
        outcome,
        FrameOutcome::Presented { rebuild: Some(RebuildStatus::Rebuilt { generation: 1, .. }), .. }
    ));
    assert!(!renderer.lifecycle().is_rebuild_pending());
    assert_eq!(gpu.state().submits(), 1);
}

/// The surface can report 0x0 while the window still has its old size
#[test]
fn test_surface_zero_extent_tick_defers() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    let epoch_before = renderer.lifecycle().epoch().unwrap().clone();
    gpu.state_mut().surface_extent = Some(MINIMIZED);
    renderer.notify_resized();

    let outcome = renderer.draw_frame(EXTENT).unwrap();
    assert!(matches!(
        outcome,
        FrameOutcome::Presented { rebuild: Some(RebuildStatus::Deferred), .. }
    ));
    assert_eq!(renderer.lifecycle().epoch().unwrap(), &epoch_before);
    assert!(renderer.lifecycle().is_rebuild_pending());

    gpu.state_mut().clear_calls();
    assert_eq!(renderer.draw_frame(EXTENT).unwrap(), FrameOutcome::Deferred);
    assert!(!gpu.state().calls().iter().any(|call| matches!(call, GpuCall::WaitIdle)));
    assert_eq!(gpu.state().submits(), 0);
    assert_eq!(gpu.state().live(Resource::Swapchain), 1);

    gpu.state_mut().surface_extent = None;
    let outcome = renderer.draw_frame(EXTENT).unwrap();
    assert!(matches!(
        outcome,
        FrameOutcome::Presented { rebuild: Some(RebuildStatus::Rebuilt { generation: 1, .. }), .. }
    ));
    assert!(!renderer.lifecycle().is_rebuild_pending());
}

/// Every rebuild path leaves the frame slots and the vertex arena untouched
#[test]
fn test_rebuilds_leave_slots_and_arena_alone() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    renderer.update_vertex_buffer(&two_triangles()).unwrap();
    let slots_before: Vec<_> = (0..renderer.frames().frames_in_flight())
        .map(|i| renderer.frames().slot(i).unwrap())
        .collect();
    let maps_before = renderer.arena().map_count();
    let contents_before = renderer.arena().contents().to_vec();
    gpu.state_mut().clear_calls();

    // Resize signaled by the window
    renderer.notify_resized();
    renderer.draw_frame(RESIZED).unwrap();
    // Present reports out of date
    gpu.state_mut().present_script.push_back(Ok(PresentOutcome::OutOfDate));
    renderer.draw_frame(RESIZED).unwrap();
    // Acquire reports out of date
    gpu.state_mut().stale_acquires.insert(3);
    let outcome = renderer.draw_frame(RESIZED).unwrap();
    assert!(matches!(outcome, FrameOutcome::Aborted { .. }));
    // Minimized, then restored
    assert_eq!(renderer.draw_frame(MINIMIZED).unwrap(), FrameOutcome::Deferred);
    renderer.draw_frame(EXTENT).unwrap();

    assert_eq!(renderer.lifecycle().epoch().unwrap().generation, 4);
    assert_eq!(gpu.state().count(|call| matches!(call, GpuCall::Create(Resource::Swapchain))), 4);

    let slots_after: Vec<_> = (0..renderer.frames().frames_in_flight())
        .map(|i| renderer.frames().slot(i).unwrap())
        .collect();
    assert_eq!(slots_after, slots_before);
    let sync_calls = gpu.state().count(|call| {
        matches!(
            call,
            GpuCall::CreateFence { .. } | GpuCall::DestroyFence(_) | GpuCall::CreateSemaphore(_) | GpuCall::DestroySemaphore(_)
        )
    });
    assert_eq!(sync_calls, 0);
    assert_eq!(renderer.arena().map_count(), maps_before);
    assert_eq!(renderer.arena().contents(), &contents_before[..]);
    assert_eq!(renderer.vertex_count(), 6);
}

/// Uploads wait on every slot fence before touching the arena
#[test]
fn test_upload_waits_for_in_flight_frames() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    renderer.draw_frame(EXTENT).unwrap();
    gpu.state_mut().clear_calls();

    renderer.update_vertex_buffer(&two_triangles()).unwrap();
    let fences: Vec<vk::Fence> = (0..2).map(|i| renderer.frames().slot(i).unwrap().in_flight).collect();
    assert_eq!(gpu.state().calls(), &[GpuCall::WaitForFences(fences)]);
}

/// Uploading every tick waits on each slot fence once per reuse
#[test]
fn test_per_frame_upload_waits_each_fence_once() {
    let gpu = MockGpu::new(2);
    let mut renderer = renderer(&gpu, 1000);
    let fences: Vec<vk::Fence> = (0..2).map(|i| renderer.frames().slot(i).unwrap().in_flight).collect();
    renderer.update_vertex_buffer(&two_triangles()).unwrap();
    gpu.state_mut().clear_calls();

    for tick in 0..6 {
        let slot = presented_slot(renderer.draw_frame(EXTENT).unwrap());
        assert_eq!(slot, tick % 2);
        renderer.update_vertex_buffer(&two_triangles()).unwrap();
    }

    let state = gpu.state();
    let waits: Vec<&GpuCall> = state
        .calls()
        .iter()
        .filter(|call| matches!(call, GpuCall::WaitForFences(_)))
        .collect();
    // Only the gate waits, and only on the fence submitted since the last upload
    let expected: Vec<GpuCall> = (0..6).map(|tick| GpuCall::WaitForFences(vec![fences[tick % 2]])).collect();
    assert_eq!(waits, expected.iter().collect::<Vec<_>>());

    // Uploading again with nothing submitted waits on nothing
    drop(state);
    gpu.state_mut().clear_calls();
    renderer.update_vertex_buffer(&two_triangles()).unwrap();
    assert!(gpu.state().calls().is_empty());
}

/// An oversized upload is rejected and the previous geometry keeps drawing
#[test]
fn test_capacity_violation_keeps_previous_geometry() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 6);
    renderer.update_vertex_buffer(&two_triangles()).unwrap();
    let arena_before = renderer.arena().contents().to_vec();

    let mut too_many = two_triangles();
    too_many.push(add_triangle(0.0, 0.0, 10.0, 10.0));
    assert_eq!(
        renderer.update_vertex_buffer(&too_many),
        Err(VulkanError::CapacityExceeded { requested: 9, capacity: 6 })
    );
    assert_eq!(renderer.arena().contents(), arena_before.as_slice());

    renderer.draw_frame(EXTENT).unwrap();
    assert_eq!(gpu.state().draw_counts(), vec![6]);
}

#[test]
fn test_shutdown_releases_everything() {
    let gpu = MockGpu::new(3);
    let mut renderer = renderer(&gpu, 1000);
    renderer.draw_frame(EXTENT).unwrap();
    renderer.shutdown().unwrap();

    assert_eq!(gpu.state().live_resources(), 0);
    assert_eq!(gpu.state().live_sync_objects(), 0);

    // Drop after an explicit shutdown does nothing more
    gpu.state_mut().clear_calls();
    drop(renderer);
    assert!(gpu.state().calls().is_empty());
}

#[test]
fn test_drop_shuts_down() {
    let gpu = MockGpu::new(3);
    let renderer = renderer(&gpu, 1000);
    drop(renderer);
    assert_eq!(gpu.state().live_resources(), 0);
    assert_eq!(gpu.state().live_sync_objects(), 0);
}

#[test]
fn test_invalid_config_rejected() {
    let gpu = MockGpu::new(3);
    let config = RendererConfig::default().with_max_frames_in_flight(0);
    let result = Renderer::new(gpu.device(), gpu.factory(), MockArena::new(10), &config, EXTENT);
    assert!(matches!(result, Err(VulkanError::InitializationFailed(_))));
    assert_eq!(gpu.state().live_resources(), 0);
}

/// Descriptor set failure unwinds the epoch and the slots
#[test]
fn test_startup_failure_unwinds() {
    let gpu = MockGpu::new(3);
    gpu.state_mut().fail_next = Some(Resource::DescriptorSet);
    let config = RendererConfig::default();
    let result = Renderer::new(gpu.device(), gpu.factory(), MockArena::new(10), &config, EXTENT);
    assert!(result.is_err());
    assert_eq!(gpu.state().live_resources(), 0);
    assert_eq!(gpu.state().live_sync_objects(), 0);
}
