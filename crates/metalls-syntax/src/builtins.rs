//! Static tables of Metal Shading Language keywords, types, attributes and
//! standard library functions.

use self::BuiltinKind::{Attribute, Function};

/// What a builtin entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    /// A language keyword or qualifier.
    Keyword,
    /// A scalar, vector, matrix, texture or sampler type.
    Type,
    /// A `[[...]]` attribute.
    Attribute,
    /// A standard library function.
    Function,
}

/// Documentation for one builtin name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    /// The name as written in source.
    pub name: &'static str,
    /// The entry kind.
    pub kind: BuiltinKind,
    /// A representative declaration (for functions, a callable label).
    pub signature: &'static str,
    /// A one-line description.
    pub description: &'static str,
}

const fn entry(
    name: &'static str,
    kind: BuiltinKind,
    signature: &'static str,
    description: &'static str,
) -> Builtin {
    Builtin {
        name,
        kind,
        signature,
        description,
    }
}

/// Keywords and qualifiers.
pub const KEYWORDS: &[&str] = &[
    "break", "case", "const", "constant", "constexpr", "continue", "default", "device", "do",
    "else", "enum", "false", "for", "fragment", "if", "inline", "kernel", "namespace",
    "return", "sampler", "static", "struct", "switch", "template", "thread", "threadgroup",
    "true", "typedef", "typename", "union", "using", "vertex", "volatile", "while",
    "static_assert", "sizeof",
];

/// Scalar and vector element types, expanded with their vector forms at lookup time.
const SCALAR_TYPES: &[&str] = &[
    "bool", "char", "uchar", "short", "ushort", "int", "uint", "long", "ulong", "half",
    "float",
];

/// Non-vector builtin types.
pub const OTHER_TYPES: &[&str] = &[
    "void", "size_t", "ptrdiff_t", "atomic_int", "atomic_uint", "atomic_bool", "sampler",
    "texture1d", "texture1d_array", "texture2d", "texture2d_array", "texture2d_ms", "texture3d",
    "texturecube", "texturecube_array", "depth2d", "depth2d_array", "depth2d_ms",
    "depthcube", "array", "packed_float2", "packed_float3", "packed_float4", "packed_half3",
    "float2x2", "float3x3", "float4x4", "float2x3", "float3x4", "float4x3", "half2x2",
    "half3x3", "half4x4", "simd_float4x4", "access", "address", "filter", "coord",
];

/// Builtin attributes, written without the surrounding brackets.
pub const ATTRIBUTES: &[Builtin] = &[
    entry("attribute", Attribute, "[[attribute(n)]]", "Vertex input attribute index."),
    entry("buffer", Attribute, "[[buffer(n)]]", "Buffer argument table index."),
    entry("texture", Attribute, "[[texture(n)]]", "Texture argument table index."),
    entry("sampler", Attribute, "[[sampler(n)]]", "Sampler argument table index."),
    entry("position", Attribute, "[[position]]", "Clip-space vertex position or fragment window coordinate."),
    entry("stage_in", Attribute, "[[stage_in]]", "Per-vertex or per-fragment input assembled by the pipeline."),
    entry("color", Attribute, "[[color(n)]]", "Fragment color attachment index."),
    entry("vertex_id", Attribute, "[[vertex_id]]", "Index of the current vertex."),
    entry("instance_id", Attribute, "[[instance_id]]", "Index of the current instance."),
    entry("point_size", Attribute, "[[point_size]]", "Size of a rasterized point."),
    entry("front_facing", Attribute, "[[front_facing]]", "Whether the primitive faces the camera."),
    entry("thread_position_in_grid", Attribute, "[[thread_position_in_grid]]", "Position of the thread in the grid."),
    entry("thread_position_in_threadgroup", Attribute, "[[thread_position_in_threadgroup]]", "Position of the thread in its threadgroup."),
    entry("threadgroup_position_in_grid", Attribute, "[[threadgroup_position_in_grid]]", "Position of the threadgroup in the grid."),
    entry("threads_per_threadgroup", Attribute, "[[threads_per_threadgroup]]", "Threadgroup size."),
    entry("threads_per_grid", Attribute, "[[threads_per_grid]]", "Grid size in threads."),
    entry("thread_index_in_simdgroup", Attribute, "[[thread_index_in_simdgroup]]", "Lane index inside the SIMD group."),
    entry("flat", Attribute, "[[flat]]", "Disable interpolation of a fragment input."),
    entry("user", Attribute, "[[user(name)]]", "User-defined interpolant name."),
    entry("function_constant", Attribute, "[[function_constant(n)]]", "Function constant index."),
];

/// Standard library functions.
pub const FUNCTIONS: &[Builtin] = &[
    entry("abs", Function, "T abs(T x)", "Absolute value of x."),
    entry("min", Function, "T min(T x, T y)", "Smaller of x and y."),
    entry("max", Function, "T max(T x, T y)", "Larger of x and y."),
    entry("clamp", Function, "T clamp(T x, T minval, T maxval)", "x clamped to [minval, maxval]."),
    entry("saturate", Function, "T saturate(T x)", "x clamped to [0, 1]."),
    entry("mix", Function, "T mix(T x, T y, T a)", "Linear blend x + (y - x) * a."),
    entry("step", Function, "T step(T edge, T x)", "0 if x < edge, else 1."),
    entry("smoothstep", Function, "T smoothstep(T edge0, T edge1, T x)", "Hermite interpolation between 0 and 1."),
    entry("sign", Function, "T sign(T x)", "Sign of x as -1, 0 or 1."),
    entry("floor", Function, "T floor(T x)", "Largest integer not greater than x."),
    entry("ceil", Function, "T ceil(T x)", "Smallest integer not less than x."),
    entry("round", Function, "T round(T x)", "Nearest integer, halfway cases away from zero."),
    entry("fract", Function, "T fract(T x)", "Fractional part of x."),
    entry("fmod", Function, "T fmod(T x, T y)", "Floating-point remainder of x / y."),
    entry("sqrt", Function, "T sqrt(T x)", "Square root of x."),
    entry("rsqrt", Function, "T rsqrt(T x)", "Reciprocal square root of x."),
    entry("pow", Function, "T pow(T x, T y)", "x raised to the power y."),
    entry("exp", Function, "T exp(T x)", "e raised to the power x."),
    entry("exp2", Function, "T exp2(T x)", "2 raised to the power x."),
    entry("log", Function, "T log(T x)", "Natural logarithm of x."),
    entry("log2", Function, "T log2(T x)", "Base-2 logarithm of x."),
    entry("sin", Function, "T sin(T x)", "Sine of x in radians."),
    entry("cos", Function, "T cos(T x)", "Cosine of x in radians."),
    entry("tan", Function, "T tan(T x)", "Tangent of x in radians."),
    entry("asin", Function, "T asin(T x)", "Arc sine of x."),
    entry("acos", Function, "T acos(T x)", "Arc cosine of x."),
    entry("atan", Function, "T atan(T y_over_x)", "Arc tangent of y_over_x."),
    entry("atan2", Function, "T atan2(T y, T x)", "Arc tangent of y / x using the signs of both."),
    entry("dot", Function, "T dot(Tn x, Tn y)", "Dot product of x and y."),
    entry("cross", Function, "T3 cross(T3 x, T3 y)", "Cross product of x and y."),
    entry("length", Function, "T length(Tn x)", "Length of vector x."),
    entry("length_squared", Function, "T length_squared(Tn x)", "Squared length of vector x."),
    entry("distance", Function, "T distance(Tn x, Tn y)", "Distance between x and y."),
    entry("normalize", Function, "Tn normalize(Tn x)", "Vector in the direction of x with length 1."),
    entry("reflect", Function, "Tn reflect(Tn i, Tn n)", "Reflection of incident vector i about normal n."),
    entry("refract", Function, "Tn refract(Tn i, Tn n, T eta)", "Refraction of incident vector i through normal n."),
    entry("faceforward", Function, "Tn faceforward(Tn n, Tn i, Tn nref)", "n oriented to face away from i."),
    entry("transpose", Function, "M transpose(M m)", "Transpose of matrix m."),
    entry("determinant", Function, "T determinant(M m)", "Determinant of square matrix m."),
    entry("select", Function, "T select(T a, T b, bool c)", "b if c is true, else a."),
    entry("all", Function, "bool all(booln x)", "True if every component of x is true."),
    entry("any", Function, "bool any(booln x)", "True if any component of x is true."),
    entry("isnan", Function, "bool isnan(T x)", "True if x is NaN."),
    entry("isinf", Function, "bool isinf(T x)", "True if x is infinite."),
    entry("fma", Function, "T fma(T a, T b, T c)", "Fused multiply-add a * b + c."),
    entry("dfdx", Function, "T dfdx(T p)", "Screen-space derivative of p along x."),
    entry("dfdy", Function, "T dfdy(T p)", "Screen-space derivative of p along y."),
    entry("fwidth", Function, "T fwidth(T p)", "abs(dfdx(p)) + abs(dfdy(p))."),
    entry("discard_fragment", Function, "void discard_fragment()", "Discard the current fragment."),
    entry(
        "threadgroup_barrier",
        Function,
        "void threadgroup_barrier(mem_flags flags)",
        "Synchronize all threads in the threadgroup.",
    ),
    entry(
        "simdgroup_barrier",
        Function,
        "void simdgroup_barrier(mem_flags flags)",
        "Synchronize all threads in the SIMD group.",
    ),
    entry(
        "atomic_fetch_add_explicit",
        Function,
        "T atomic_fetch_add_explicit(volatile device atomic<T>* object, T operand, memory_order order)",
        "Atomically add operand and return the previous value.",
    ),
    entry(
        "atomic_store_explicit",
        Function,
        "void atomic_store_explicit(volatile device atomic<T>* object, T desired, memory_order order)",
        "Atomically replace the stored value.",
    ),
    entry(
        "atomic_load_explicit",
        Function,
        "T atomic_load_explicit(const volatile device atomic<T>* object, memory_order order)",
        "Atomically read the stored value.",
    ),
    entry("sample", Function, "Tv4 sample(sampler s, float2 coord)", "Sample a texture (texture member function)."),
    entry("read", Function, "Tv4 read(uint2 coord, uint lod = 0)", "Read a texel without sampling (texture member function)."),
    entry("write", Function, "void write(Tv4 color, uint2 coord, uint lod = 0)", "Write a texel (texture member function)."),
    entry("get_width", Function, "uint get_width(uint lod = 0)", "Texture width in texels (texture member function)."),
    entry("get_height", Function, "uint get_height(uint lod = 0)", "Texture height in texels (texture member function)."),
];

/// Whether `word` is a keyword or qualifier.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Whether `word` names a builtin type, including vector forms like `float3`
/// and `uint2`.
pub fn is_builtin_type(word: &str) -> bool {
    if OTHER_TYPES.contains(&word) || SCALAR_TYPES.contains(&word) {
        return true;
    }
    let Some(last) = word.bytes().last() else {
        return false;
    };
    matches!(last, b'2'..=b'4') && SCALAR_TYPES.contains(&&word[..word.len() - 1])
}

/// Every builtin type name, vector forms included.
pub fn builtin_types() -> impl Iterator<Item = String> {
    SCALAR_TYPES
        .iter()
        .flat_map(|scalar| {
            std::iter::once((*scalar).to_string())
                .chain((2..=4).map(move |n| format!("{scalar}{n}")))
        })
        .chain(OTHER_TYPES.iter().map(|t| (*t).to_string()))
}

/// Look up a builtin function by name.
pub fn function(name: &str) -> Option<&'static Builtin> {
    FUNCTIONS.iter().find(|b| b.name == name)
}

/// Look up a builtin attribute by name.
pub fn attribute(name: &str) -> Option<&'static Builtin> {
    ATTRIBUTES.iter().find(|b| b.name == name)
}

/// Hover-style documentation for any builtin name.
///
/// Functions take precedence over attributes, then types, then keywords.
pub fn documentation(name: &str) -> Option<String> {
    if let Some(f) = function(name) {
        return Some(format!("```metal\n{}\n```\n\n{}", f.signature, f.description));
    }
    if let Some(a) = attribute(name) {
        return Some(format!("```metal\n{}\n```\n\n{}", a.signature, a.description));
    }
    if is_builtin_type(name) {
        return Some(format!("```metal\n{name}\n```\n\nBuiltin type."));
    }
    if is_keyword(name) {
        return Some(format!("```metal\n{name}\n```\n\nKeyword."));
    }
    None
}
