//! Definition value objects.
//!
//! A [`VertexDef`] is a sparse, flagged bag of attribute values: the unit of
//! input to store inserts/updates, the output of gathers, and the value the
//! diffusion resolver averages. Each field carries a presence flag in a
//! [`FieldMask`]; absence is semantically distinct from a zero value.

use crate::math::{Real, Vec3};

/// External, caller-supplied stable vertex identifier.
pub type VertId = u64;

/// Identifies one bone for skin weight operations.
pub type BoneId = String;

/// One bone's contribution to a vertex.
///
/// A vertex's full set is an ordered list with unique bone identifiers;
/// duplicates are a caller error.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneWeight {
    pub bone: BoneId,
    pub weight: Real,
}

impl BoneWeight {
    pub fn new(bone: impl Into<BoneId>, weight: Real) -> Self {
        Self {
            bone: bone.into(),
            weight,
        }
    }
}

/// Bitmask selecting a subset of vertex attribute channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldMask(u8);

impl FieldMask {
    pub const NONE: Self = Self(0);
    pub const ID: Self = Self(1 << 0);
    pub const POSITION: Self = Self(1 << 1);
    pub const NORMAL: Self = Self(1 << 2);
    pub const UVW: Self = Self(1 << 3);
    pub const WEIGHTS: Self = Self(1 << 4);
    pub const CONNECTS: Self = Self(1 << 5);
    pub const USER_DATA: Self = Self(1 << 6);
    pub const COLOR: Self = Self(1 << 7);
    pub const ALL: Self = Self(u8::MAX);

    /// Whether any of `other`'s bits are set.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every one of `other`'s bits is set.
    pub fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// This mask with `other`'s bits removed.
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for FieldMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FieldMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for FieldMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Sparse, flagged set of per-vertex attribute values.
///
/// Setters store a value and set its presence flag; getters return `None`
/// for absent fields. Definitions have no identity beyond the call that
/// produces or consumes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexDef<U> {
    mask: FieldMask,
    id: VertId,
    position: Vec3,
    normal: Vec3,
    uvw: Vec3,
    color: Vec3,
    weights: Vec<BoneWeight>,
    connects: Vec<VertId>,
    user_data: U,
}

impl<U: Default + Clone> VertexDef<U> {
    pub fn new() -> Self {
        Self {
            mask: FieldMask::NONE,
            id: 0,
            position: Vec3::zeros(),
            normal: Vec3::zeros(),
            uvw: Vec3::zeros(),
            color: Vec3::zeros(),
            weights: Vec::new(),
            connects: Vec::new(),
            user_data: U::default(),
        }
    }

    /// The set of fields currently present.
    pub fn mask(&self) -> FieldMask {
        self.mask
    }

    pub fn set_id(&mut self, id: VertId) {
        self.id = id;
        self.mask |= FieldMask::ID;
    }

    pub fn id(&self) -> Option<VertId> {
        self.mask.intersects(FieldMask::ID).then_some(self.id)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.mask |= FieldMask::POSITION;
    }

    pub fn position(&self) -> Option<Vec3> {
        self.mask
            .intersects(FieldMask::POSITION)
            .then_some(self.position)
    }

    pub fn set_normal(&mut self, normal: Vec3) {
        self.normal = normal;
        self.mask |= FieldMask::NORMAL;
    }

    pub fn normal(&self) -> Option<Vec3> {
        self.mask
            .intersects(FieldMask::NORMAL)
            .then_some(self.normal)
    }

    pub fn set_uvw(&mut self, uvw: Vec3) {
        self.uvw = uvw;
        self.mask |= FieldMask::UVW;
    }

    pub fn uvw(&self) -> Option<Vec3> {
        self.mask.intersects(FieldMask::UVW).then_some(self.uvw)
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.mask |= FieldMask::COLOR;
    }

    pub fn color(&self) -> Option<Vec3> {
        self.mask.intersects(FieldMask::COLOR).then_some(self.color)
    }

    pub fn set_weights(&mut self, weights: Vec<BoneWeight>) {
        self.weights = weights;
        self.mask |= FieldMask::WEIGHTS;
    }

    pub fn weights(&self) -> Option<&[BoneWeight]> {
        self.mask
            .intersects(FieldMask::WEIGHTS)
            .then_some(self.weights.as_slice())
    }

    pub fn set_connects(&mut self, connects: Vec<VertId>) {
        self.connects = connects;
        self.mask |= FieldMask::CONNECTS;
    }

    pub fn connects(&self) -> Option<&[VertId]> {
        self.mask
            .intersects(FieldMask::CONNECTS)
            .then_some(self.connects.as_slice())
    }

    pub fn set_user_data(&mut self, user_data: U) {
        self.user_data = user_data;
        self.mask |= FieldMask::USER_DATA;
    }

    pub fn user_data(&self) -> Option<&U> {
        self.mask
            .intersects(FieldMask::USER_DATA)
            .then_some(&self.user_data)
    }

    /// Clears presence (and values) of every field outside `mask`.
    pub fn retain(&mut self, mask: FieldMask) {
        let dropped = self.mask.without(mask);
        if dropped.intersects(FieldMask::ID) {
            self.id = 0;
        }
        if dropped.intersects(FieldMask::POSITION) {
            self.position = Vec3::zeros();
        }
        if dropped.intersects(FieldMask::NORMAL) {
            self.normal = Vec3::zeros();
        }
        if dropped.intersects(FieldMask::UVW) {
            self.uvw = Vec3::zeros();
        }
        if dropped.intersects(FieldMask::COLOR) {
            self.color = Vec3::zeros();
        }
        if dropped.intersects(FieldMask::WEIGHTS) {
            self.weights.clear();
        }
        if dropped.intersects(FieldMask::CONNECTS) {
            self.connects.clear();
        }
        if dropped.intersects(FieldMask::USER_DATA) {
            self.user_data = U::default();
        }
        self.mask = self.mask & mask;
    }

    /// Copies every field present in `other` into this definition.
    pub fn merge_from(&mut self, other: &Self) {
        if let Some(id) = other.id() {
            self.set_id(id);
        }
        if let Some(position) = other.position() {
            self.set_position(position);
        }
        if let Some(normal) = other.normal() {
            self.set_normal(normal);
        }
        if let Some(uvw) = other.uvw() {
            self.set_uvw(uvw);
        }
        if let Some(color) = other.color() {
            self.set_color(color);
        }
        if let Some(weights) = other.weights() {
            self.set_weights(weights.to_vec());
        }
        if let Some(connects) = other.connects() {
            self.set_connects(connects.to_vec());
        }
        if let Some(user_data) = other.user_data() {
            self.set_user_data(user_data.clone());
        }
    }
}

/// Merge `incoming` bone weights into `accumulated`, scaled by `modifier`.
///
/// Matching bone identity accumulates `weight * modifier`; a new identity
/// inserts a fresh scaled entry.
pub fn accumulate_weights(accumulated: &mut Vec<BoneWeight>, incoming: &[BoneWeight], modifier: Real) {
    for entry in incoming {
        match accumulated.iter_mut().find(|w| w.bone == entry.bone) {
            Some(found) => found.weight += entry.weight * modifier,
            None => accumulated.push(BoneWeight::new(entry.bone.clone(), entry.weight * modifier)),
        }
    }
}

/// Combine definitions as an explicit weighted average.
///
/// With `normalize`, the blend factor is `1 / Σweights` (left at 1 when the
/// sum is not positive); each input contributes `value * (weight * factor)`.
/// Vector fields accumulate per component, bone weights merge by identity,
/// and connectivity becomes the deduplicated union minus every contributing
/// definition's own external id. Returns an empty definition when the input
/// lengths differ or are zero.
pub fn combine_defs<U: Default + Clone>(
    defs: &[VertexDef<U>],
    weights: &[Real],
    normalize: bool,
) -> VertexDef<U> {
    let mut result = VertexDef::new();
    if defs.is_empty() || defs.len() != weights.len() {
        return result;
    }

    let mut factor = 1.0;
    if normalize {
        let total: Real = weights.iter().sum();
        if total > 0.0 {
            factor = 1.0 / total;
        }
    }

    let mut position = Vec3::zeros();
    let mut normal = Vec3::zeros();
    let mut uvw = Vec3::zeros();
    let mut color = Vec3::zeros();
    let mut merged_weights: Vec<BoneWeight> = Vec::new();
    let mut connects: Vec<VertId> = Vec::new();
    let mut present = FieldMask::NONE;

    let self_ids: Vec<VertId> = defs.iter().filter_map(|d| d.id()).collect();

    for (def, &weight) in defs.iter().zip(weights) {
        let scaled = weight * factor;
        if let Some(p) = def.position() {
            position += p * scaled;
            present |= FieldMask::POSITION;
        }
        if let Some(n) = def.normal() {
            normal += n * scaled;
            present |= FieldMask::NORMAL;
        }
        if let Some(t) = def.uvw() {
            uvw += t * scaled;
            present |= FieldMask::UVW;
        }
        if let Some(c) = def.color() {
            color += c * scaled;
            present |= FieldMask::COLOR;
        }
        if let Some(bones) = def.weights() {
            accumulate_weights(&mut merged_weights, bones, scaled);
            present |= FieldMask::WEIGHTS;
        }
        if let Some(ids) = def.connects() {
            for &id in ids {
                if !self_ids.contains(&id) && !connects.contains(&id) {
                    connects.push(id);
                }
            }
            present |= FieldMask::CONNECTS;
        }
    }

    if present.intersects(FieldMask::POSITION) {
        result.set_position(position);
    }
    if present.intersects(FieldMask::NORMAL) {
        result.set_normal(normal);
    }
    if present.intersects(FieldMask::UVW) {
        result.set_uvw(uvw);
    }
    if present.intersects(FieldMask::COLOR) {
        result.set_color(color);
    }
    if present.intersects(FieldMask::WEIGHTS) {
        result.set_weights(merged_weights);
    }
    if present.intersects(FieldMask::CONNECTS) {
        result.set_connects(connects);
    }

    result
}

/// [`combine_defs`] with every input weighted equally.
pub fn combine_defs_uniform<U: Default + Clone>(
    defs: &[VertexDef<U>],
    normalize: bool,
) -> VertexDef<U> {
    let weights = vec![1.0; defs.len()];
    combine_defs(defs, &weights, normalize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_stay_absent() {
        let def = VertexDef::<usize>::new();
        assert!(def.mask().is_empty());
        assert_eq!(def.position(), None);
        assert_eq!(def.id(), None);
        assert_eq!(def.weights(), None);
    }

    #[test]
    fn setters_flag_presence() {
        let mut def = VertexDef::<usize>::new();
        def.set_position(Vec3::new(1.0, 2.0, 3.0));
        def.set_id(9);
        assert_eq!(def.position(), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(def.id(), Some(9));
        assert!(def.mask().contains_all(FieldMask::ID | FieldMask::POSITION));
        assert_eq!(def.normal(), None);
    }

    #[test]
    fn zero_value_is_distinct_from_absence() {
        let mut def = VertexDef::<usize>::new();
        def.set_position(Vec3::zeros());
        assert_eq!(def.position(), Some(Vec3::zeros()));
    }

    #[test]
    fn retain_clears_unrequested_fields() {
        let mut def = VertexDef::<usize>::new();
        def.set_id(1);
        def.set_position(Vec3::new(1.0, 0.0, 0.0));
        def.set_weights(vec![BoneWeight::new("a", 1.0)]);

        def.retain(FieldMask::WEIGHTS);
        assert_eq!(def.id(), None);
        assert_eq!(def.position(), None);
        assert_eq!(def.weights().map(|w| w.len()), Some(1));
    }

    #[test]
    fn accumulate_merges_by_identity() {
        let mut acc = vec![BoneWeight::new("a", 0.5)];
        accumulate_weights(
            &mut acc,
            &[BoneWeight::new("a", 1.0), BoneWeight::new("b", 1.0)],
            0.5,
        );
        assert_eq!(acc.len(), 2);
        assert!((acc[0].weight - 1.0).abs() < 1e-12);
        assert!((acc[1].weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn combine_averages_positions() {
        let mut a = VertexDef::<usize>::new();
        a.set_position(Vec3::new(0.0, 0.0, 0.0));
        let mut b = VertexDef::<usize>::new();
        b.set_position(Vec3::new(2.0, 4.0, 6.0));

        let combined = combine_defs_uniform(&[a, b], true);
        assert_eq!(combined.position(), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn combine_averages_colors() {
        let mut a = VertexDef::<usize>::new();
        a.set_color(Vec3::new(1.0, 0.0, 0.0));
        let mut b = VertexDef::<usize>::new();
        b.set_color(Vec3::new(0.0, 1.0, 0.0));

        let combined = combine_defs_uniform(&[a, b], true);
        assert_eq!(combined.color(), Some(Vec3::new(0.5, 0.5, 0.0)));
    }

    #[test]
    fn combine_blends_bone_weights() {
        let mut a = VertexDef::<usize>::new();
        a.set_weights(vec![BoneWeight::new("top", 1.0)]);
        let mut b = VertexDef::<usize>::new();
        b.set_weights(vec![BoneWeight::new("bottom", 1.0)]);

        let combined = combine_defs_uniform(&[a, b], true);
        let weights = combined.weights().unwrap();
        assert_eq!(weights.len(), 2);
        for w in weights {
            assert!((w.weight - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn combine_unions_connects_minus_contributors() {
        let mut a = VertexDef::<usize>::new();
        a.set_id(1);
        a.set_connects(vec![2, 3]);
        let mut b = VertexDef::<usize>::new();
        b.set_id(2);
        b.set_connects(vec![1, 3, 4]);

        let combined = combine_defs_uniform(&[a, b], true);
        assert_eq!(combined.connects(), Some(&[3, 4][..]));
    }

    #[test]
    fn combine_rejects_mismatched_lengths() {
        let mut a = VertexDef::<usize>::new();
        a.set_position(Vec3::new(1.0, 1.0, 1.0));
        let combined = combine_defs(&[a], &[1.0, 2.0], true);
        assert!(combined.mask().is_empty());
    }
}
