use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use jellyfield_common::{BlockColor, LevelData};
use jellyfield_kernel::{GridEvent, Session, SessionEvent, SessionState};
use jellyfield_render::StreamKind;
use jellyfield_render_wgpu::{GameCamera, JellyRenderer, RenderResources, StreamCapacities};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "jellyfield-desktop", about = "Jellyfield desktop application")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Level file (.yaml, .yml or .json); the built-in demo when omitted
    level: Option<PathBuf>,

    /// Damage per shot
    #[arg(long, default_value = "10")]
    damage: u32,
}

fn egui_color(rgba: [f32; 4]) -> egui::Color32 {
    egui::Color32::from_rgb(
        (rgba[0] * 255.0) as u8,
        (rgba[1] * 255.0) as u8,
        (rgba[2] * 255.0) as u8,
    )
}

/// Application state.
struct AppState {
    session: Session,
    camera: GameCamera,
    damage: u32,
    auto_fire: bool,
    fire_interval: f32,
    fire_timer: f32,
    next_auto_color: usize,
    kills: u64,
    show_hud: bool,
    started: Instant,
    // Input state
    keys_held: HashSet<KeyCode>,
    mouse_captured: bool,
    last_frame: Instant,
    // Fixed timestep
    tick_accumulator: f64,
    tick_rate: f64,
}

impl AppState {
    fn new(level: LevelData, damage: u32) -> Self {
        let mut session = Session::new(level);
        session.start();
        Self {
            session,
            camera: GameCamera::default(),
            damage,
            auto_fire: false,
            fire_interval: 0.15,
            fire_timer: 0.0,
            next_auto_color: 0,
            kills: 0,
            show_hud: true,
            started: Instant::now(),
            keys_held: HashSet::new(),
            mouse_captured: false,
            last_frame: Instant::now(),
            tick_accumulator: 0.0,
            tick_rate: 1.0 / 60.0,
        }
    }

    fn fire(&mut self, color: BlockColor) {
        let muzzle = self.camera.muzzle();
        self.session.fire(color, muzzle, self.damage);
    }

    fn hammer(&mut self, color: BlockColor) {
        if let Some(killed) = self.session.hammer(color) {
            tracing::info!(%color, killed, "hammer");
        }
    }

    /// Cycle through colors that still have live blocks.
    fn auto_fire_step(&mut self) {
        for _ in 0..BlockColor::ALL.len() {
            let color = BlockColor::ALL[self.next_auto_color % BlockColor::ALL.len()];
            self.next_auto_color += 1;
            if self.session.store().has_alive_of_color(color) {
                self.fire(color);
                return;
            }
        }
    }

    fn update(&mut self, dt: f32) {
        let speed_mult = if self.keys_held.contains(&KeyCode::ShiftLeft) {
            3.0
        } else {
            1.0
        };
        let dt_scaled = dt * speed_mult;

        if self.keys_held.contains(&KeyCode::KeyW) {
            self.camera.move_forward(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::KeyS) {
            self.camera.move_backward(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::KeyA) {
            self.camera.move_left(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::KeyD) {
            self.camera.move_right(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::Space) {
            self.camera.move_up(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::ControlLeft) {
            self.camera.move_down(dt_scaled);
        }

        self.tick_accumulator += dt as f64;
        while self.tick_accumulator >= self.tick_rate {
            self.tick_accumulator -= self.tick_rate;
            let step = self.tick_rate as f32;

            if self.auto_fire {
                self.fire_timer += step;
                while self.fire_timer >= self.fire_interval {
                    self.fire_timer -= self.fire_interval;
                    self.auto_fire_step();
                }
            }

            self.session.tick(step);
            for event in self.session.drain_events() {
                match event {
                    SessionEvent::WaveStarted { index, enemies } => {
                        tracing::info!(wave = index, enemies, "wave started");
                    }
                    SessionEvent::Grid(GridEvent::EntityDied { .. }) => self.kills += 1,
                    SessionEvent::Grid(GridEvent::WaveCleared) => tracing::info!("wave cleared"),
                    SessionEvent::LevelComplete => {
                        tracing::info!(kills = self.kills, "level complete");
                        self.auto_fire = false;
                    }
                    SessionEvent::Grid(GridEvent::EntityHit { .. }) => {}
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
        }

        if !pressed {
            return;
        }

        let hammer = self.keys_held.contains(&KeyCode::KeyH);
        let color = match key {
            KeyCode::Digit1 => Some(BlockColor::Red),
            KeyCode::Digit2 => Some(BlockColor::Blue),
            KeyCode::Digit3 => Some(BlockColor::Green),
            KeyCode::Digit4 => Some(BlockColor::Yellow),
            _ => None,
        };
        if let Some(color) = color {
            if hammer {
                self.hammer(color);
            } else {
                self.fire(color);
            }
            return;
        }

        match key {
            KeyCode::KeyF => self.auto_fire = !self.auto_fire,
            KeyCode::KeyR => {
                self.session.start();
                self.kills = 0;
                tracing::info!("level restarted");
            }
            KeyCode::F1 => self.show_hud = !self.show_hud,
            _ => {}
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_hud {
            return;
        }

        egui::SidePanel::left("hud")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading(&self.session.level().name);
                ui.separator();
                let state = match self.session.state() {
                    SessionState::Ready => "ready".to_string(),
                    SessionState::Playing { wave } => {
                        format!("wave {}/{}", wave + 1, self.session.level().waves.len())
                    }
                    SessionState::Victory => "victory".to_string(),
                };
                ui.label(format!("State: {state}"));
                let store = self.session.store();
                ui.label(format!("Alive: {}/{}", store.alive_count(), store.capacity()));
                ui.label(format!("Wave HP: {}", store.wave_total_hp()));
                ui.label(format!("Kills: {}", self.kills));
                ui.label(format!(
                    "Projectiles: {}/{}",
                    self.session.projectiles().live_count(),
                    self.session.projectiles().capacity()
                ));
                for kind in StreamKind::ALL {
                    let batch = self.session.batch(kind);
                    ui.label(format!(
                        "{}: {} instances{}",
                        kind.label(),
                        batch.active_count(),
                        if self.session.stream_enabled(kind) {
                            ""
                        } else {
                            " (disabled)"
                        }
                    ));
                }
                ui.label(format!(
                    "Camera: ({:.1}, {:.1}, {:.1})",
                    self.camera.position.x, self.camera.position.y, self.camera.position.z
                ));
                ui.separator();

                ui.heading("Fire");
                let palette = self.session.level().config.palette;
                let mut hovered = None;
                let mut fire = None;
                ui.horizontal(|ui| {
                    for color in BlockColor::ALL {
                        let count = self.session.store().count_alive_of_color(color);
                        let button = egui::Button::new(
                            egui::RichText::new(format!("{color} {count}"))
                                .color(egui_color(palette.color(color))),
                        );
                        let response = ui.add_enabled(count > 0, button);
                        if response.hovered() {
                            hovered = Some(color);
                        }
                        if response.clicked() {
                            fire = Some(color);
                        }
                    }
                });
                ui.checkbox(&mut self.auto_fire, "Auto fire (F)");
                ui.add(egui::Slider::new(&mut self.damage, 1..=120).text("damage"));

                ui.separator();
                ui.heading(format!("Hammer ({})", self.session.hammer_charges()));
                let mut hammer = None;
                ui.horizontal(|ui| {
                    for color in BlockColor::ALL {
                        let enabled = self.session.hammer_charges() > 0
                            && self.session.store().has_alive_of_color(color);
                        let response = ui.add_enabled(enabled, egui::Button::new(color.name()));
                        if response.hovered() {
                            hovered = Some(color);
                        }
                        if response.clicked() {
                            hammer = Some(color);
                        }
                    }
                });

                self.session.set_highlight(hovered);
                if let Some(color) = fire {
                    self.fire(color);
                }
                if let Some(color) = hammer {
                    self.hammer(color);
                }

                ui.separator();
                if ui.button("Restart (R)").clicked() {
                    self.session.start();
                    self.kills = 0;
                }
                ui.small("1-4: Fire | H+1-4: Hammer | RMB: Look | WASD: Move | F1: HUD");
            });
    }
}

struct GpuApp {
    state: AppState,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    renderer: Option<JellyRenderer>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
}

impl GpuApp {
    fn new(level: LevelData, damage: u32) -> Self {
        Self {
            state: AppState::new(level, damage),
            window: None,
            surface: None,
            device: None,
            queue: None,
            config: None,
            renderer: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Jellyfield")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("find adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("jellyfield_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .expect("create device");

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.state.camera.set_viewport(size.width, size.height);

        let renderer = match JellyRenderer::new(
            &device,
            surface_format,
            size.width,
            size.height,
            &self.state.session.level().config,
            StreamCapacities::for_session(&self.state.session),
            RenderResources::default(),
        ) {
            Ok(renderer) => renderer,
            Err(e) => {
                tracing::error!("renderer init failed: {e}");
                event_loop.exit();
                return;
            }
        };
        renderer.apply_stream_state(&mut self.state.session);

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        self.window = Some(window);
        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);
        self.renderer = Some(renderer);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            let response = egui_winit.on_window_event(window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(surface), Some(device), Some(config)) =
                    (&self.surface, &self.device, &mut self.config)
                {
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(device, config);
                    self.state.camera.set_viewport(config.width, config.height);
                    if let Some(renderer) = &mut self.renderer {
                        renderer.resize(device, config.width, config.height);
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                self.state
                    .handle_key(key, key_state == ElementState::Pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.state.mouse_captured = btn_state == ElementState::Pressed;
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!self.state.mouse_captured);
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
                self.state.last_frame = now;
                self.state.update(dt);

                let (
                    Some(surface),
                    Some(device),
                    Some(queue),
                    Some(config),
                    Some(window),
                    Some(egui_winit),
                    Some(egui_renderer),
                ) = (
                    &self.surface,
                    &self.device,
                    &self.queue,
                    &self.config,
                    &self.window,
                    &mut self.egui_winit,
                    &mut self.egui_renderer,
                )
                else {
                    return;
                };

                let output = match surface.get_current_texture() {
                    Ok(t) => t,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        surface.configure(device, config);
                        return;
                    }
                    Err(e) => {
                        tracing::error!("surface error: {e}");
                        return;
                    }
                };

                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                if let Some(renderer) = &mut self.renderer {
                    let time = self.state.started.elapsed().as_secs_f32();
                    renderer.render(
                        device,
                        queue,
                        &view,
                        &self.state.camera,
                        &mut self.state.session,
                        time,
                    );
                }

                let raw_input = egui_winit.take_egui_input(window);
                let full_output = self.egui_ctx.run(raw_input, |ctx| {
                    self.state.draw_ui(ctx);
                });
                egui_winit.handle_platform_output(window, full_output.platform_output);

                let paint_jobs = self
                    .egui_ctx
                    .tessellate(full_output.shapes, full_output.pixels_per_point);

                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [config.width, config.height],
                    pixels_per_point: full_output.pixels_per_point,
                };

                for (id, image_delta) in &full_output.textures_delta.set {
                    egui_renderer.update_texture(device, queue, *id, image_delta);
                }
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("egui_encoder"),
                });
                egui_renderer.update_buffers(
                    device,
                    queue,
                    &mut encoder,
                    &paint_jobs,
                    &screen_descriptor,
                );
                {
                    let mut pass = encoder
                        .begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("egui_pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Load,
                                    store: wgpu::StoreOp::Store,
                                },
                            })],
                            depth_stencil_attachment: None,
                            ..Default::default()
                        })
                        .forget_lifetime();
                    egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
                }
                queue.submit(std::iter::once(encoder.finish()));
                for id in &full_output.textures_delta.free {
                    egui_renderer.free_texture(id);
                }

                output.present();
                window.request_redraw();
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.mouse_captured {
                self.state.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let level = match &cli.level {
        Some(path) => LevelData::load(path)
            .with_context(|| format!("loading level {}", path.display()))?,
        None => LevelData::demo(),
    };
    tracing::info!(level = %level.name, waves = level.waves.len(), "jellyfield-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(level, cli.damage);
    event_loop.run_app(&mut app)?;

    Ok(())
}
