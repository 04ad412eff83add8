//! Sources of the built-in programs and the prelude of user programs.
//!
//! Sources carry no `#version` line; the device prepends the one matching its shading language.
//! Static programs, built-in or not, are compiled behind `STATIC_HEADER`, which declares every
//! uniform the static renderer sets and a few helpers. Its arrays are sized by the
//! `MAX_LIGHTS` and `TEXTURE_SLOTS` defines of the renderer's `StaticLimits`.
//!
//! * `slotHasTexture(slot)`, `sampleColor(slot, uv)`, `sampleShininess(slot, uv)`,
//! * `canSampleFramebuffer()`, `sampleFramebuffer(uv)`,
//! * `calculateLight(position, normal, diffuseAmount, diffuse, specularAmount, specular,
//!   shininess)`, the summed Blinn-Phong term of every enabled light.
//!
//! The vertex stage additionally gets the `position`, `normal`, `uv` and `userData` attributes.

pub const SPRITE_VS: &str = r#"
in vec2 pos;
in vec4 color;
in vec2 uv;
in float useTex;
in float object;

uniform float contextWidth;
uniform float contextHeight;
uniform mat4 contextTransform;
uniform sampler2D objects;

out vec4 fragColor;
out vec2 fragUV;
out float fragUseTex;

mat4 objectMatrix(int i) {
    if (i < 0) {
        return mat4(1.0);
    }

    return mat4(
        texelFetch(objects, ivec2(0, i), 0),
        texelFetch(objects, ivec2(1, i), 0),
        texelFetch(objects, ivec2(2, i), 0),
        texelFetch(objects, ivec2(3, i), 0));
}

void main() {
    vec4 p = contextTransform * (objectMatrix(int(object)) * vec4(pos, 0.0, 1.0));
    gl_Position = vec4(
        (p.x / contextWidth) * 2.0 - 1.0,
        -((p.y / contextHeight) * 2.0 - 1.0),
        0.0,
        1.0);

    fragColor = color;
    fragUV = uv;
    fragUseTex = useTex;
}
"#;

pub const SPRITE_FS: &str = r#"
in vec4 fragColor;
in vec2 fragUV;
in float fragUseTex;

uniform sampler2D atlas;

out vec4 outColor;

void main() {
    if (fragUseTex > -0.5) {
        outColor = texture(atlas, fragUV) * fragColor;
    } else {
        outColor = fragColor;
    }
}
"#;

pub const STATIC_HEADER: &str = r#"
uniform mat4 view;
uniform mat4 viewNormal;
uniform mat4 projection;
uniform mat4 model;
uniform mat4 normalMatrix;

uniform vec4 material[12];
uniform vec4 textureSlots[TEXTURE_SLOTS];
uniform vec4 lightPositions[MAX_LIGHTS];
uniform vec4 lightColors[MAX_LIGHTS];

uniform sampler2D atlas;
uniform sampler2D sampleBuffer;
uniform int hasSampleBuffer;

#define MaterialAmbient (material[0].xyz)
#define MaterialDiffuse (material[1].xyz)
#define MaterialDiffuseAmount (material[1].w)
#define MaterialSpecular (material[2].xyz)
#define MaterialSpecularAmount (material[2].w)
#define MaterialShininess (material[3].x)
#define MaterialData(i) (material[4 + (i)])

bool slotHasTexture(int slot) {
    return textureSlots[slot].x > -0.5;
}

vec4 sampleColor(int slot, vec2 localUV) {
    vec4 rect = textureSlots[slot];
    return texture(atlas, rect.xy + clamp(localUV, 0.0, 1.0) * rect.zw);
}

float sampleShininess(int slot, vec2 localUV) {
    return sampleColor(slot, localUV).r * 100.0;
}

bool canSampleFramebuffer() {
    return hasSampleBuffer != 0;
}

vec4 sampleFramebuffer(vec2 localUV) {
    return texture(sampleBuffer, localUV);
}

vec3 blinnPhong(vec3 pos, vec3 normal, vec3 lightDir,
                float diffuseAmount, vec3 diffuse,
                float specularAmount, vec3 specular,
                float falloff, float shininess) {
    vec3 color = vec3(0.0);
    float intensity = max(0.0, dot(normalize(lightDir), normalize(normal)));
    color += intensity * diffuse * diffuseAmount / falloff;

    if (intensity > 0.0) {
        vec3 h = normalize(lightDir + normalize(-pos));
        color += pow(max(dot(h, normal), 0.0), shininess) * specular * specularAmount / falloff;
    }

    return color;
}

vec3 calculateLight(vec3 pos, vec3 normal,
                    float diffuseAmount, vec3 diffuse,
                    float specularAmount, vec3 specular,
                    float shininess) {
    vec3 color = vec3(0.0);
    for (int i = 0; i < MAX_LIGHTS; i++) {
        float kind = lightColors[i].w;
        if (kind < 0.0) {
            break;
        }

        vec3 lightColor = lightColors[i].xyz * lightPositions[i].w;
        if (kind < 0.1 || kind > 0.2) {
            vec3 lightPos = (view * vec4(lightPositions[i].xyz, 1.0)).xyz;
            vec3 lightDir = lightPos - pos;
            float falloff = max(length(lightDir), 1.0);
            color += lightColor * blinnPhong(pos, normal, normalize(lightDir),
                diffuseAmount, diffuse, specularAmount, specular, falloff * falloff, shininess);
        } else {
            vec3 lightDir = (viewNormal * vec4(-lightPositions[i].xyz, 0.0)).xyz;
            color += lightColor * blinnPhong(pos, normal, normalize(lightDir),
                diffuseAmount, diffuse, specularAmount, specular, 1.0, shininess);
        }
    }

    return color;
}
"#;

pub const STATIC_ATTRIBUTES: &str = r#"
in vec3 position;
in vec3 normal;
in vec2 uv;
in vec4 userData;
"#;

pub const BASIC_VS: &str = r#"
out vec2 fragUV;

void main() {
    gl_Position = projection * (view * (model * vec4(position, 1.0)));
    fragUV = uv;
}
"#;

pub const BASIC_FS: &str = r#"
in vec2 fragUV;
out vec4 outColor;

void main() {
    vec4 color;
    if (slotHasTexture(0)) {
        color = sampleColor(0, fragUV);
    } else {
        color = vec4(MaterialDiffuse, 1.0);
    }

    if (canSampleFramebuffer()) {
        color = 0.5 * color + 0.5 * sampleFramebuffer(fragUV);
    }

    outColor = color;
}
"#;

pub const LIGHT_VS: &str = r#"
out vec2 fragUV;
out vec3 fragNormal;
out vec3 fragPos;

void main() {
    vec4 p = view * (model * vec4(position, 1.0));
    gl_Position = projection * p;

    fragUV = uv;
    fragNormal = (viewNormal * (normalMatrix * vec4(normal, 0.0))).xyz;
    fragPos = p.xyz / p.w;
}
"#;

pub const LIGHT_FS: &str = r#"
in vec2 fragUV;
in vec3 fragNormal;
in vec3 fragPos;
out vec4 outColor;

void main() {
    float reflectivity = 1.0;
    if (slotHasTexture(1)) {
        reflectivity = sampleShininess(1, fragUV);
    }

    vec4 color = vec4(MaterialAmbient, 1.0);
    color.xyz += reflectivity * calculateLight(
        fragPos,
        normalize(fragNormal),
        MaterialDiffuseAmount,
        MaterialDiffuse,
        MaterialSpecularAmount,
        MaterialSpecular,
        MaterialShininess);

    if (slotHasTexture(0)) {
        color = mix(color, sampleColor(0, fragUV), 0.5);
    }

    if (canSampleFramebuffer()) {
        color = color * sampleFramebuffer(fragUV);
    }

    outColor = color;
}
"#;

/// The array sizes of `STATIC_HEADER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticLimits {
    pub lights: usize,
    pub slots: usize,
}

/// Puts the static prelude in front of `src`. A leading `#version` line stays first and line
/// numbers in compile logs keep referring to `src`.
pub fn static_source(src: &str, vertex: bool, limits: StaticLimits) -> String {
    let (version, body, first_line) = match src.find('\n') {
        Some(n) if src.starts_with("#version") => (&src[..=n], &src[n + 1..], 1),
        _ if src.starts_with("#version") => (src, "", 1),
        _ => ("", src, 0),
    };

    let attributes = if vertex { STATIC_ATTRIBUTES } else { "" };
    format!(
        "{}#define MAX_LIGHTS {}\n#define TEXTURE_SLOTS {}\n{}{}#line {}\n{}",
        version, limits.lights, limits.slots, attributes, STATIC_HEADER, first_line, body
    )
}

#[cfg(test)]
mod test {
    use super::*;

    const LIMITS: StaticLimits = StaticLimits {
        lights: 32,
        slots: 32,
    };

    #[test]
    fn hoists_version() {
        let src = static_source("#version 330\nvoid main() {}", false, LIMITS);
        assert!(src.starts_with("#version 330\n#define MAX_LIGHTS 32\n"));
        assert!(src.ends_with("#line 1\nvoid main() {}"));
        assert!(!src.contains("in vec3 position;"));

        let src = static_source("void main() {}", true, LIMITS);
        assert!(src.starts_with("#define MAX_LIGHTS 32\n#define TEXTURE_SLOTS 32\n"));
        assert!(src.contains(STATIC_ATTRIBUTES));
        assert!(src.ends_with("#line 0\nvoid main() {}"));
    }

    #[test]
    fn sized_arrays() {
        let limits = StaticLimits {
            lights: 40,
            slots: 48,
        };

        let src = static_source("void main() {}", false, limits);
        assert!(src.contains("#define MAX_LIGHTS 40\n#define TEXTURE_SLOTS 48\n"));
        assert!(STATIC_HEADER.contains("lightColors[MAX_LIGHTS]"));
        assert!(STATIC_HEADER.contains("textureSlots[TEXTURE_SLOTS]"));
        assert!(!STATIC_HEADER.contains("[32]"));
    }
}
