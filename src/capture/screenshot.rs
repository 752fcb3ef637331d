//! Window capture using the Windows Graphics Capture API.

use anyhow::{Context, Result, anyhow};
use image::{Rgb, RgbImage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{
    Direct3D11CaptureFramePool, GraphicsCaptureItem, GraphicsCaptureSession,
};
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_SDK_VERSION,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING, D3D11CreateDevice, ID3D11Device,
    ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
};
use windows::Win32::System::WinRT::Direct3D11::CreateDirect3D11DeviceFromDXGIDevice;
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::core::Interface;

use super::FrameSource;
use super::crop::crop_playable_area;
use crate::window::{PlayableArea, WindowGeometry};

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Closes the capture session and its frame pool on every exit path.
struct SessionGuard<'a> {
    session: &'a GraphicsCaptureSession,
    frame_pool: &'a Direct3D11CaptureFramePool,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.session.Close() {
            log::debug!("Closing capture session failed: {}", e);
        }
        if let Err(e) = self.frame_pool.Close() {
            log::debug!("Closing frame pool failed: {}", e);
        }
    }
}

/// Captures the client area of `window` as an RGB image.
///
/// The capture covers the whole window including decorations; it is cropped
/// to the client area using the client origin relative to the window rect.
pub fn capture_client_area(window: &WindowGeometry) -> Result<RgbImage> {
    let hwnd = HWND(window.handle as *mut _);
    let client_width = window.client_width().max(0) as u32;
    let client_height = window.client_height().max(0) as u32;
    if client_width == 0 || client_height == 0 {
        return Err(anyhow!("Window has no client area to capture"));
    }

    let (device, context) = create_d3d11_device()?;
    let item = create_capture_item(hwnd)?;
    let size = item.Size()?;

    let d3d_device = create_direct3d_device(&device)?;
    let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
        &d3d_device,
        DirectXPixelFormat::B8G8R8A8UIntNormalized,
        1,
        size,
    )?;
    let session = frame_pool.CreateCaptureSession(&item)?;
    let _guard = SessionGuard {
        session: &session,
        frame_pool: &frame_pool,
    };

    let frame_arrived = Arc::new(AtomicBool::new(false));
    let frame_arrived_clone = frame_arrived.clone();
    frame_pool.FrameArrived(&TypedEventHandler::new(
        move |_pool: &Option<Direct3D11CaptureFramePool>, _| {
            frame_arrived_clone.store(true, Ordering::SeqCst);
            Ok(())
        },
    ))?;

    session.StartCapture()?;

    let start = Instant::now();
    while !frame_arrived.load(Ordering::SeqCst) {
        if start.elapsed() > FRAME_TIMEOUT {
            return Err(anyhow!("Timeout waiting for frame"));
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    let frame = frame_pool.TryGetNextFrame()?;
    let surface = frame.Surface()?;
    let access: windows::Win32::System::WinRT::Direct3D11::IDirect3DDxgiInterfaceAccess =
        surface.cast()?;
    let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };

    let mut desc = D3D11_TEXTURE2D_DESC::default();
    unsafe { texture.GetDesc(&mut desc) };

    let staging_desc = D3D11_TEXTURE2D_DESC {
        Width: desc.Width,
        Height: desc.Height,
        MipLevels: 1,
        ArraySize: 1,
        Format: desc.Format,
        SampleDesc: desc.SampleDesc,
        Usage: D3D11_USAGE_STAGING,
        BindFlags: Default::default(),
        CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
        MiscFlags: Default::default(),
    };

    let staging_texture = unsafe {
        let mut staging: Option<ID3D11Texture2D> = None;
        device.CreateTexture2D(&staging_desc, None, Some(&mut staging))?;
        staging.ok_or_else(|| anyhow!("Failed to create staging texture"))?
    };
    let staging_resource = staging_texture.cast::<ID3D11Resource>()?;

    unsafe {
        context.CopyResource(&staging_resource, &texture.cast::<ID3D11Resource>()?);
    }

    let mapped = unsafe {
        let mut mapped = Default::default();
        context.Map(&staging_resource, 0, D3D11_MAP_READ, 0, Some(&mut mapped))?;
        mapped
    };

    // Client origin inside the captured window image
    let crop_x = (window.client_screen_origin.x - window.window_rect.left).max(0) as u32;
    let crop_y = (window.client_screen_origin.y - window.window_rect.top).max(0) as u32;
    log::debug!(
        "Capture {}x{}, client {}x{} at offset ({}, {})",
        desc.Width,
        desc.Height,
        client_width,
        client_height,
        crop_x,
        crop_y
    );

    let mut img = RgbImage::new(client_width, client_height);
    let src_data = unsafe {
        std::slice::from_raw_parts(
            mapped.pData as *const u8,
            (mapped.RowPitch * desc.Height) as usize,
        )
    };
    let row_pitch = mapped.RowPitch as usize;

    for y in 0..client_height {
        let src_y = (crop_y + y) as usize;
        if src_y >= desc.Height as usize {
            break;
        }
        for x in 0..client_width {
            let src_x = (crop_x + x) as usize;
            if src_x >= desc.Width as usize {
                break;
            }
            let offset = src_y * row_pitch + src_x * 4;
            // BGRA -> RGB
            img.put_pixel(
                x,
                y,
                Rgb([src_data[offset + 2], src_data[offset + 1], src_data[offset]]),
            );
        }
    }

    unsafe {
        context.Unmap(&staging_resource, 0);
    }

    Ok(img)
}

/// Live frames from the game window through Windows Graphics Capture.
#[derive(Default)]
pub struct WindowFrameSource;

impl FrameSource for WindowFrameSource {
    fn capture(&mut self, window: &WindowGeometry, area: &PlayableArea) -> Result<RgbImage> {
        let client = capture_client_area(window)?;
        let frame = crop_playable_area(&client, window, area);
        if frame.width() == 0 || frame.height() == 0 {
            return Err(anyhow!("Playable area is empty"));
        }
        Ok(frame)
    }
}

fn create_d3d11_device() -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;

    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;
    }

    Ok((
        device.ok_or_else(|| anyhow!("Failed to create D3D11 device"))?,
        context.ok_or_else(|| anyhow!("Failed to create D3D11 context"))?,
    ))
}

/// WinRT wrapper around the D3D11 device, required by the capture API.
fn create_direct3d_device(
    device: &ID3D11Device,
) -> Result<windows::Graphics::DirectX::Direct3D11::IDirect3DDevice> {
    let dxgi_device: windows::Win32::Graphics::Dxgi::IDXGIDevice = device.cast()?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)? };
    inspectable
        .cast()
        .context("Failed to cast to IDirect3DDevice")
}

fn create_capture_item(hwnd: HWND) -> Result<GraphicsCaptureItem> {
    let class_name = windows::core::h!("Windows.Graphics.Capture.GraphicsCaptureItem");
    let interop: IGraphicsCaptureItemInterop = unsafe {
        windows::Win32::System::WinRT::RoGetActivationFactory(class_name)
            .context("Failed to get IGraphicsCaptureItemInterop")?
    };
    unsafe {
        interop
            .CreateForWindow(hwnd)
            .context("Failed to create capture item for window")
    }
}
