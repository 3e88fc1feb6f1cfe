//! Piecewise-linear gain curve attached to a clip
//!
//! Point times are stored relative to the envelope offset (the clip start), so
//! moving a clip only moves the offset. Public methods take absolute times.

/// One control point of the curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopePoint {
    /// Seconds from the envelope offset
    pub time: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    points: Vec<EnvelopePoint>,
    offset: f64,
    track_len: f64,
    default_value: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Envelope {
    pub fn new(default_value: f64) -> Self {
        Self {
            points: Vec::new(),
            offset: 0.0,
            track_len: 0.0,
            default_value,
        }
    }

    pub fn points(&self) -> &[EnvelopePoint] {
        &self.points
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    pub fn track_len(&self) -> f64 {
        self.track_len
    }

    pub fn set_track_len(&mut self, track_len: f64) {
        self.track_len = track_len.max(0.0);
    }

    /// Add or replace the point at absolute time `t`
    pub fn insert(&mut self, t: f64, value: f64) {
        let time = t - self.offset;
        match self
            .points
            .iter()
            .position(|point| point.time >= time)
        {
            Some(index) if self.points[index].time == time => self.points[index].value = value,
            Some(index) => self.points.insert(index, EnvelopePoint { time, value }),
            None => self.points.push(EnvelopePoint { time, value }),
        }
    }

    /// Curve value at absolute time `t`
    pub fn value_at(&self, t: f64) -> f64 {
        interpolate(&self.points, t - self.offset, self.default_value)
    }

    /// Open a gap of `len` seconds at absolute time `t`
    pub fn insert_space(&mut self, t: f64, len: f64) {
        let time = t - self.offset;
        for point in self.points.iter_mut().filter(|point| point.time > time) {
            point.time += len;
        }
        self.track_len += len;
    }

    /// Remove `[t0, t1)` and close the gap
    pub fn collapse_region(&mut self, t0: f64, t1: f64) {
        let start = t0 - self.offset;
        let end = t1 - self.offset;
        let len = end - start;
        if len <= 0.0 {
            return;
        }
        self.points
            .retain(|point| point.time < start || point.time >= end);
        for point in self.points.iter_mut().filter(|point| point.time >= end) {
            point.time -= len;
        }
        self.track_len = (self.track_len - len).max(0.0);
    }

    /// Splice `other` in at absolute time `t0`, shifting later points by its length
    pub fn paste(&mut self, t0: f64, other: &Envelope) {
        let time = t0 - self.offset;
        let len = other.track_len;
        let boundary_value = self.value_at(t0);
        for point in self.points.iter_mut().filter(|point| point.time > time) {
            point.time += len;
        }
        // Keep the curve continuous on both sides of the pasted region
        if !other.points.is_empty() {
            self.insert(t0, boundary_value);
            self.insert(t0 + len, boundary_value);
        }
        for point in &other.points {
            self.insert(t0 + point.time, point.value);
        }
        self.track_len += len;
    }

    /// New envelope holding the curve between absolute `t0` and `t1`, offset 0
    pub fn copy_range(&self, t0: f64, t1: f64) -> Envelope {
        let start = t0 - self.offset;
        let end = t1 - self.offset;
        let mut copy = Envelope::new(self.default_value);
        copy.track_len = (end - start).max(0.0);
        if self.points.is_empty() {
            return copy;
        }
        copy.points.push(EnvelopePoint {
            time: 0.0,
            value: self.value_at(t0),
        });
        copy.points.extend(
            self.points
                .iter()
                .filter(|point| point.time > start && point.time < end)
                .map(|point| EnvelopePoint {
                    time: point.time - start,
                    value: point.value,
                }),
        );
        if end > start {
            copy.points.push(EnvelopePoint {
                time: end - start,
                value: self.value_at(t1),
            });
        }
        copy
    }

    /// Drop points that lie on the line through their neighbours
    pub fn remove_unneeded_points(&mut self) {
        const TOLERANCE: f64 = 1e-7;
        let mut index = 1;
        while index + 1 < self.points.len() {
            let prev = self.points[index - 1];
            let next = self.points[index + 1];
            let point = self.points[index];
            let span = next.time - prev.time;
            let expected = if span > 0.0 {
                prev.value + (next.value - prev.value) * (point.time - prev.time) / span
            } else {
                prev.value
            };
            if (expected - point.value).abs() < TOLERANCE {
                self.points.remove(index);
            } else {
                index += 1;
            }
        }
        if self.points.len() == 1 && (self.points[0].value - self.default_value).abs() < TOLERANCE
        {
            self.points.clear();
        }
    }
}

fn interpolate(points: &[EnvelopePoint], time: f64, default_value: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return default_value,
    };
    if time <= first.time {
        return first.value;
    }
    if time >= last.time {
        return last.value;
    }
    let next = points.partition_point(|point| point.time <= time);
    let a = points[next - 1];
    let b = points[next];
    let span = b.time - a.time;
    if span <= 0.0 {
        return b.value;
    }
    a.value + (b.value - a.value) * (time - a.time) / span
}
