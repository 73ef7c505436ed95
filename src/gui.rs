use crate::all::*;

use softbuffer::GraphicsContext;
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::{Window, WindowBuilder};

// Single window showing the input frame next to the canvas. Events are
// pumped without blocking once per displayed frame; Escape and Q request
// quitting, which the orchestrator maps to a cooperative interrupt.
pub struct Gui {
  event_loop: EventLoop<()>,
  graphics_context: GraphicsContext<Window>,
  buffer: Vec<u32>,
  width: usize,
  height: usize,
}

impl Gui {
  pub fn new(video: Shape, target: Shape) -> Result<Gui> {
    let width = video.width + target.width;
    let height = usize::max(video.height, target.height);
    let size = winit::dpi::PhysicalSize::new(width as u32, height as u32);
    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
      .with_title("docstitch")
      .with_resizable(false)
      .with_min_inner_size(size)
      .with_max_inner_size(size)
      .build(&event_loop)
      .map_err(|err| anyhow!("Failed to create window: {}", err))?;
    let graphics_context = unsafe { GraphicsContext::new(window) }
      .map_err(|err| anyhow!("Failed to create graphics context: {:?}", err))?;
    Ok(Gui {
      event_loop,
      graphics_context,
      buffer: vec![0; width * height],
      width,
      height,
    })
  }

  // Drain pending window events. Returns false when the user asked to quit.
  fn pump_events(&mut self) -> bool {
    let mut quit = false;
    self.event_loop.run_return(|event, _, control_flow| {
      *control_flow = ControlFlow::Exit;
      match event {
        Event::WindowEvent { event, .. } => {
          match event {
            WindowEvent::CloseRequested => quit = true,
            WindowEvent::KeyboardInput {
              input: KeyboardInput {
                state: ElementState::Pressed,
                virtual_keycode: Some(keycode),
                ..
              },
              ..
            } => {
              match keycode {
                VirtualKeyCode::Escape | VirtualKeyCode::Q => quit = true,
                _ => {}, // Other keys.
              }
            },
            _ => {}, // Other window events.
          }
        },
        _ => {}, // Other events.
      }
    });
    !quit
  }
}

impl Viewer for Gui {
  fn update(&mut self, view: View) -> Result<bool> {
    let mut args = VisualizeArgs {
      buffer: &mut self.buffer,
      buffer_w: self.width,
      buffer_h: self.height,
    };
    render(&mut args, &view);
    self.graphics_context.set_buffer(&self.buffer, self.width as u16, self.height as u16);
    Ok(self.pump_events())
  }
}
