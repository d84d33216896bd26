//! Full-screen blit pipeline.
//!
//! The vertex shader derives a covering triangle from `SV_VertexID`, so the
//! draw needs no vertex or index buffer. State is bound once at creation;
//! only the source view, render target and viewport change per draw.

use std::ffi::c_void;

use windows::core::{s, PCSTR};
use windows::Win32::Graphics::Direct3D::Fxc::D3DCompile;
use windows::Win32::Graphics::Direct3D::{ID3DBlob, D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST};
use windows::Win32::Graphics::Direct3D11::{
    ID3D11Device, ID3D11DeviceContext, ID3D11PixelShader, ID3D11RasterizerState,
    ID3D11RenderTargetView, ID3D11SamplerState, ID3D11ShaderResourceView, ID3D11VertexShader,
    D3D11_CULL_NONE, D3D11_FILL_SOLID, D3D11_FILTER_MIN_MAG_MIP_POINT, D3D11_RASTERIZER_DESC,
    D3D11_SAMPLER_DESC, D3D11_TEXTURE_ADDRESS_WRAP, D3D11_VIEWPORT,
};

use super::create;
use crate::error::{InteropError, InteropResult};
use crate::swapchain::Viewport;

const BLIT_SHADER: &str = r#"
Texture2D srcTex : register(t0);
SamplerState samp : register(s0);

struct VsOut {
    float4 pos : SV_POSITION;
    float2 uv : TEXCOORD0;
};

VsOut VsMain(uint id : SV_VertexID) {
    VsOut o;
    o.pos = float4(id >> 1, id & 1, 0, 0.5) * 4 - 1;
    o.uv = float2(id >> 1, id & 1) * 2;
    return o;
}

float4 PsMain(VsOut i) : SV_TARGET {
    return srcTex.Sample(samp, i.uv);
}
"#;

pub struct BlitPipeline {
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    rasterizer_state: ID3D11RasterizerState,
    sampler_state: ID3D11SamplerState,
}

impl BlitPipeline {
    /// Compile the shaders and create the fixed state objects.
    pub fn new(device: &ID3D11Device) -> InteropResult<Self> {
        let vs_blob = compile(s!("VsMain"), s!("vs_5_0"), "VsMain")?;
        let ps_blob = compile(s!("PsMain"), s!("ps_5_0"), "PsMain")?;

        let vertex_shader = create("ID3D11Device::CreateVertexShader", |out| unsafe {
            device.CreateVertexShader(blob_bytes(&vs_blob), None, out)
        })?;
        let pixel_shader = create("ID3D11Device::CreatePixelShader", |out| unsafe {
            device.CreatePixelShader(blob_bytes(&ps_blob), None, out)
        })?;

        let rasterizer_state = create("ID3D11Device::CreateRasterizerState", |out| unsafe {
            device.CreateRasterizerState(
                &D3D11_RASTERIZER_DESC {
                    FillMode: D3D11_FILL_SOLID,
                    CullMode: D3D11_CULL_NONE,
                    ..Default::default()
                },
                out,
            )
        })?;

        let sampler_state = create("ID3D11Device::CreateSamplerState", |out| unsafe {
            device.CreateSamplerState(
                &D3D11_SAMPLER_DESC {
                    Filter: D3D11_FILTER_MIN_MAG_MIP_POINT,
                    AddressU: D3D11_TEXTURE_ADDRESS_WRAP,
                    AddressV: D3D11_TEXTURE_ADDRESS_WRAP,
                    AddressW: D3D11_TEXTURE_ADDRESS_WRAP,
                    ..Default::default()
                },
                out,
            )
        })?;

        Ok(Self {
            vertex_shader,
            pixel_shader,
            rasterizer_state,
            sampler_state,
        })
    }

    /// Bind topology, shaders, rasterizer and sampler.
    pub fn bind(&self, context: &ID3D11DeviceContext) {
        unsafe {
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            context.VSSetShader(&self.vertex_shader, None);
            context.RSSetState(&self.rasterizer_state);
            context.PSSetShader(&self.pixel_shader, None);
            context.PSSetSamplers(0, Some(&[Some(self.sampler_state.clone())]));
        }
    }

    /// Draw `source` over the whole of `target`.
    pub fn draw(
        &self,
        context: &ID3D11DeviceContext,
        source: &ID3D11ShaderResourceView,
        target: &ID3D11RenderTargetView,
        viewport: &Viewport,
    ) {
        unsafe {
            context.RSSetViewports(Some(&[D3D11_VIEWPORT {
                TopLeftX: 0.0,
                TopLeftY: 0.0,
                Width: viewport.width as f32,
                Height: viewport.height as f32,
                MinDepth: 0.0,
                MaxDepth: 1.0,
            }]));
            context.PSSetShaderResources(0, Some(&[Some(source.clone())]));
            context.OMSetRenderTargets(Some(&[Some(target.clone())]), None);
            context.Draw(3, 0);
            // The source goes back to GL after the draw.
            context.PSSetShaderResources(0, Some(&[None]));
        }
    }
}

fn compile(entry: PCSTR, target: PCSTR, entry_name: &str) -> InteropResult<ID3DBlob> {
    let mut blob: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;
    let result = unsafe {
        D3DCompile(
            BLIT_SHADER.as_ptr() as *const c_void,
            BLIT_SHADER.len(),
            s!("blit.hlsl"),
            None,
            None,
            entry,
            target,
            0,
            0,
            &mut blob,
            Some(&mut errors),
        )
    };

    if let Err(e) = result {
        let diagnostics = errors
            .as_ref()
            .map(|errors| {
                String::from_utf8_lossy(blob_bytes(errors))
                    .trim_end_matches('\0')
                    .to_string()
            })
            .unwrap_or_else(|| e.message().to_string());
        log::error!("[D3D11] {} failed to compile: {}", entry_name, diagnostics);
        return Err(InteropError::ShaderCompile {
            entry_point: entry_name.to_string(),
            diagnostics,
        });
    }
    blob.ok_or_else(|| InteropError::ShaderCompile {
        entry_point: entry_name.to_string(),
        diagnostics: "compiler returned no bytecode".to_string(),
    })
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}
