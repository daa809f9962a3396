//! Runtime support shared by every emitted module.
//!
//! The text is include-guarded so that the outputs of several modules
//! can be concatenated into one translation unit.

pub const PRELUDE: &str = r#"#ifndef WASMDEC_RUNTIME
#define WASMDEC_RUNTIME

#include <stdint.h>
#include <stdlib.h>
#include <string.h>
#include <math.h>

typedef void (*wasm_funcref)(void);

static inline uint32_t wasm_clz32(uint32_t x) {
  uint32_t n = 0;
  if (x == 0) {
    return 32;
  }
  while (!(x & 0x80000000u)) {
    x <<= 1;
    n++;
  }
  return n;
}

static inline uint64_t wasm_clz64(uint64_t x) {
  uint64_t n = 0;
  if (x == 0) {
    return 64;
  }
  while (!(x & UINT64_C(0x8000000000000000))) {
    x <<= 1;
    n++;
  }
  return n;
}

static inline uint32_t wasm_ctz32(uint32_t x) {
  uint32_t n = 0;
  if (x == 0) {
    return 32;
  }
  while (!(x & 1u)) {
    x >>= 1;
    n++;
  }
  return n;
}

static inline uint64_t wasm_ctz64(uint64_t x) {
  uint64_t n = 0;
  if (x == 0) {
    return 64;
  }
  while (!(x & 1u)) {
    x >>= 1;
    n++;
  }
  return n;
}

static inline uint32_t wasm_popcnt32(uint32_t x) {
  uint32_t n = 0;
  while (x) {
    n += x & 1u;
    x >>= 1;
  }
  return n;
}

static inline uint64_t wasm_popcnt64(uint64_t x) {
  uint64_t n = 0;
  while (x) {
    n += x & 1u;
    x >>= 1;
  }
  return n;
}

static inline uint32_t wasm_rotl32(uint32_t x, uint32_t k) {
  k &= 31;
  return k ? (x << k) | (x >> (32 - k)) : x;
}

static inline uint32_t wasm_rotr32(uint32_t x, uint32_t k) {
  k &= 31;
  return k ? (x >> k) | (x << (32 - k)) : x;
}

static inline uint64_t wasm_rotl64(uint64_t x, uint64_t k) {
  k &= 63;
  return k ? (x << k) | (x >> (64 - k)) : x;
}

static inline uint64_t wasm_rotr64(uint64_t x, uint64_t k) {
  k &= 63;
  return k ? (x >> k) | (x << (64 - k)) : x;
}

static inline float wasm_f32_from_bits(uint32_t bits) {
  float f;
  memcpy(&f, &bits, sizeof(f));
  return f;
}

static inline double wasm_f64_from_bits(uint64_t bits) {
  double f;
  memcpy(&f, &bits, sizeof(f));
  return f;
}

static inline uint32_t wasm_f32_to_bits(float f) {
  uint32_t bits;
  memcpy(&bits, &f, sizeof(bits));
  return bits;
}

static inline uint64_t wasm_f64_to_bits(double f) {
  uint64_t bits;
  memcpy(&bits, &f, sizeof(bits));
  return bits;
}

static inline float wasm_fmin32(float a, float b) {
  if (a != a || b != b) {
    return a + b;
  }
  if (a == b) {
    return signbit(a) ? a : b;
  }
  return a < b ? a : b;
}

static inline float wasm_fmax32(float a, float b) {
  if (a != a || b != b) {
    return a + b;
  }
  if (a == b) {
    return signbit(a) ? b : a;
  }
  return a > b ? a : b;
}

static inline double wasm_fmin64(double a, double b) {
  if (a != a || b != b) {
    return a + b;
  }
  if (a == b) {
    return signbit(a) ? a : b;
  }
  return a < b ? a : b;
}

static inline double wasm_fmax64(double a, double b) {
  if (a != a || b != b) {
    return a + b;
  }
  if (a == b) {
    return signbit(a) ? b : a;
  }
  return a > b ? a : b;
}

/* Linear memory is accessed bytewise: addresses need not be aligned. */
#define WASM_MEMORY_ACCESS(name, type) \
  static inline type wasm_load_##name(const uint8_t *p) { \
    type v; \
    memcpy(&v, p, sizeof(v)); \
    return v; \
  } \
  static inline void wasm_store_##name(uint8_t *p, type v) { \
    memcpy(p, &v, sizeof(v)); \
  }

WASM_MEMORY_ACCESS(i8, int8_t)
WASM_MEMORY_ACCESS(u8, uint8_t)
WASM_MEMORY_ACCESS(i16, int16_t)
WASM_MEMORY_ACCESS(u16, uint16_t)
WASM_MEMORY_ACCESS(i32, int32_t)
WASM_MEMORY_ACCESS(u32, uint32_t)
WASM_MEMORY_ACCESS(i64, int64_t)
WASM_MEMORY_ACCESS(f32, float)
WASM_MEMORY_ACCESS(f64, double)

#undef WASM_MEMORY_ACCESS

static inline int32_t wasm_trunc_sat_i32_s(double x) {
  if (x != x) {
    return 0;
  }
  if (x <= -2147483648.0) {
    return INT32_MIN;
  }
  if (x >= 2147483648.0) {
    return INT32_MAX;
  }
  return (int32_t)x;
}

static inline int32_t wasm_trunc_sat_i32_u(double x) {
  if (!(x > -1.0)) {
    return 0;
  }
  if (x >= 4294967296.0) {
    return (int32_t)UINT32_MAX;
  }
  return (int32_t)(uint32_t)x;
}

static inline int64_t wasm_trunc_sat_i64_s(double x) {
  if (x != x) {
    return 0;
  }
  if (x <= -9223372036854775808.0) {
    return INT64_MIN;
  }
  if (x >= 9223372036854775808.0) {
    return INT64_MAX;
  }
  return (int64_t)x;
}

static inline int64_t wasm_trunc_sat_i64_u(double x) {
  if (!(x > -1.0)) {
    return 0;
  }
  if (x >= 18446744073709551616.0) {
    return (int64_t)UINT64_MAX;
  }
  return (int64_t)(uint64_t)x;
}

#endif /* WASMDEC_RUNTIME */
"#;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn helpers_are_guarded_once() {
        assert!(PRELUDE.starts_with("#ifndef WASMDEC_RUNTIME\n#define WASMDEC_RUNTIME\n"));
        assert!(PRELUDE.trim_end().ends_with("#endif /* WASMDEC_RUNTIME */"));
        for helper in ["wasm_fmin32", "wasm_fmax64", "wasm_load_##name", "wasm_store_##name"] {
            assert_eq!(PRELUDE.matches(&format!("{}(", helper)).count(), 1, "{}", helper);
        }
        assert!(PRELUDE.contains("WASM_MEMORY_ACCESS(u16, uint16_t)\n"));
    }
}
