use std::{f32::consts::TAU, rc::Rc, time::Instant};

use anyhow::{ensure, Result};
use ash::{extensions::khr::Swapchain, vk, Entry};
use tracing::info;
use vulkan_raii::{
    chain, init_logging, CommandBuffers, CommandPoolGuard, DebugUtilsGuard, DeviceBuilder,
    FenceGuard, InstanceBuilder, LogicalDeviceGuard, PhysicalDevice, SemaphoreGuard,
    StructureChain, SurfaceGuard, SwapchainBuilder, SwapchainGuard, WindowConfig, WindowManager,
    ENABLE_VALIDATIONS,
};

const MAX_FRAMES_IN_FLIGHT: usize = 2;
const WINDOW_TITLE: &str = "Hello, Clear Colour";

fn main() -> Result<()> {
    init_logging()?;

    let mut window = WindowManager::try_new(&WindowConfig {
        title: WINDOW_TITLE.to_owned(),
        ..Default::default()
    })?;

    let entry = unsafe { Entry::load() }?;
    let instance = InstanceBuilder::default()
        .extensions(window.required_instance_extensions()?)
        .validation(ENABLE_VALIDATIONS)
        .build(&entry)?;
    let _debug_utils = ENABLE_VALIDATIONS
        .then(|| DebugUtilsGuard::try_new(&instance))
        .transpose()?;
    let surface = SurfaceGuard::try_new(&instance, window.window())?;

    let swapchain_extension = Swapchain::name().to_str()?;
    let physical_device = PhysicalDevice::select(&instance, &surface, &[swapchain_extension])?;

    let mut supported = StructureChain::new(chain![
        vk::PhysicalDeviceFeatures2::default(),
        vk::PhysicalDeviceVulkan13Features::default(),
    ]);
    physical_device.query_features(supported.as_mut());
    let vulkan13 = supported.get::<vk::PhysicalDeviceVulkan13Features, _>();
    ensure!(
        vulkan13.dynamic_rendering == vk::TRUE && vulkan13.synchronization2 == vk::TRUE,
        "{} lacks dynamic rendering or synchronization2",
        physical_device.name()
    );

    let enabled_features = StructureChain::new(chain![
        vk::PhysicalDeviceFeatures2::default(),
        vk::PhysicalDeviceVulkan13Features {
            dynamic_rendering: vk::TRUE,
            synchronization2: vk::TRUE,
            ..Default::default()
        },
    ]);
    let device = DeviceBuilder::default()
        .extensions([swapchain_extension])
        .next(enabled_features)
        .build(&physical_device)?;

    let mut renderer = Renderer::try_new(&device, &surface, window.framebuffer_size())?;
    info!("Entering main loop");
    let start = Instant::now();
    while !window.should_close() {
        window.poll_events();
        if window.take_resized() {
            renderer.recreate_swapchain(&mut window)?;
        }
        renderer.draw_frame(start.elapsed().as_secs_f32(), &mut window)?;
    }
    device.wait_idle()?;
    info!("Main loop finished");

    Ok(())
}

struct Frame {
    command_buffers: CommandBuffers,
    image_available: SemaphoreGuard,
    in_flight: FenceGuard,
}

struct Renderer {
    frames: Vec<Frame>,
    /// one per swapchain image, presentation may still be reading the last one
    render_finished: Vec<SemaphoreGuard>,
    swapchain: SwapchainGuard,
    _command_pool: Rc<CommandPoolGuard>,
    device: Rc<LogicalDeviceGuard>,
    current_frame: usize,
}

impl Renderer {
    fn try_new(
        device: &Rc<LogicalDeviceGuard>,
        surface: &Rc<SurfaceGuard>,
        framebuffer_size: (i32, i32),
    ) -> Result<Self> {
        let swapchain = SwapchainBuilder::default()
            .framebuffer_size(framebuffer_size)
            .build(device, surface)?;
        let command_pool = CommandPoolGuard::try_new(
            device,
            device.graphics_queue().family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| {
                Ok(Frame {
                    command_buffers: command_pool.allocate(vk::CommandBufferLevel::PRIMARY, 1)?,
                    image_available: SemaphoreGuard::try_new(device)?,
                    in_flight: FenceGuard::try_new(device, true)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let render_finished = render_finished_semaphores(device, &swapchain)?;

        Ok(Self {
            frames,
            render_finished,
            swapchain,
            _command_pool: command_pool,
            device: Rc::clone(device),
            current_frame: 0,
        })
    }

    fn recreate_swapchain(&mut self, window: &mut WindowManager) -> Result<()> {
        window.wait_while_minimized();
        self.swapchain = self.swapchain.recreate(window.framebuffer_size())?;
        self.render_finished = render_finished_semaphores(&self.device, &self.swapchain)?;
        info!(
            "Swapchain recreated at {}x{}",
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(())
    }

    fn draw_frame(&mut self, time: f32, window: &mut WindowManager) -> Result<()> {
        let frame = &self.frames[self.current_frame];
        frame.in_flight.wait(u64::MAX)?;

        let Some(image_index) =
            self.swapchain
                .acquire_next_image(*frame.image_available, vk::Fence::null(), u64::MAX)?
        else {
            return self.recreate_swapchain(window);
        };
        // only reset once work is certain to be submitted
        frame.in_flight.reset()?;

        frame.command_buffers.reset(0)?;
        let command_buffer = frame
            .command_buffers
            .begin(0, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        self.record(command_buffer, image_index, clear_color(time));
        frame.command_buffers.end(0)?;

        let render_finished = *self.render_finished[image_index as usize];
        let wait_semaphores = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(*frame.image_available)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .build()];
        let signal_semaphores = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(render_finished)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .build()];
        let command_buffers = [vk::CommandBufferSubmitInfo::builder()
            .command_buffer(command_buffer)
            .build()];
        let submit_info = vk::SubmitInfo2::builder()
            .wait_semaphore_infos(&wait_semaphores)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signal_semaphores)
            .build();
        unsafe {
            self.device.queue_submit2(
                self.device.graphics_queue().handle,
                &[submit_info],
                *frame.in_flight,
            )
        }?;

        let needs_recreate = self.swapchain.present(
            self.device.present_queue().handle,
            image_index,
            &[render_finished],
        )?;
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        if needs_recreate {
            self.recreate_swapchain(window)?;
        }
        Ok(())
    }

    fn record(&self, command_buffer: vk::CommandBuffer, image_index: u32, color: [f32; 4]) {
        let image = self.swapchain.images()[image_index as usize];
        let image_view = *self.swapchain.image_views()[image_index as usize];
        let extent = self.swapchain.extent();

        let color_attachments = [vk::RenderingAttachmentInfo::builder()
            .image_view(image_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            })
            .build()];
        let rendering_info = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);

        unsafe {
            transition(
                &self.device,
                command_buffer,
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            );
            self.device
                .cmd_begin_rendering(command_buffer, &rendering_info);
            self.device.cmd_end_rendering(command_buffer);
            transition(
                &self.device,
                command_buffer,
                image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
            );
        }
    }
}

fn render_finished_semaphores(
    device: &Rc<LogicalDeviceGuard>,
    swapchain: &SwapchainGuard,
) -> Result<Vec<SemaphoreGuard>> {
    swapchain
        .images()
        .iter()
        .map(|_| SemaphoreGuard::try_new(device))
        .collect()
}

unsafe fn transition(
    device: &LogicalDeviceGuard,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let image_barriers = [vk::ImageMemoryBarrier2::builder()
        .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE | vk::AccessFlags2::COLOR_ATTACHMENT_READ)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()];
    let dependency_info = vk::DependencyInfo::builder().image_memory_barriers(&image_barriers);
    device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
}

/// Slowly cycles through the hues.
fn clear_color(time: f32) -> [f32; 4] {
    let phase = time * 0.5;
    let channel = |offset: f32| 0.5 + 0.5 * (phase + offset * TAU).sin();
    [channel(0.0), channel(1.0 / 3.0), channel(2.0 / 3.0), 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_color_stays_in_range_and_opaque() {
        for step in 0..100 {
            let color = clear_color(step as f32 * 0.37);
            assert!(color[..3].iter().all(|channel| (0.0..=1.0).contains(channel)));
            assert_eq!(color[3], 1.0);
        }
    }
}
